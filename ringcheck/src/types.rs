//! Core types and data contracts for ringcheck
//!
//! Defines the shared data model passed between the pipeline stages:
//! - **Tier** and its authority/currency profile table
//! - **TierStatement**: one tier's assertion about a requirement
//! - **CandidateViolation**: raw output of the reasoning agent
//! - **RequirementTopic**, **Finding**: normalizer output
//! - **RingAvailability** / **AvailabilityLedger**: per-scan tier status
//! - **ReconciliationRecord**: cross-tier gap classification
//!
//! Everything here is created inside a single scan and dropped once the
//! report is handed off.

use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Tier
// ============================================================================

/// One of the three independent knowledge sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Organization ontology (codified standards)
    CodifiedStandards,
    /// Business documents and communications
    InformalKnowledge,
    /// Regulatory text and live web retrieval
    ExternalIntelligence,
}

/// Static attributes of a tier
///
/// `authority` is the organization's trust order for adopting a requirement;
/// `currency` is how fresh the tier's ground truth is. The two axes are
/// independent and must never be derived from each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierProfile {
    pub tier: Tier,
    /// Configuration / serialization key
    pub key: &'static str,
    /// Human-readable name
    pub label: &'static str,
    /// Adoption trust, higher = more authoritative
    pub authority: u8,
    /// Freshness, higher = more current
    pub currency: u8,
}

const TIER_PROFILES: [TierProfile; 3] = [
    TierProfile {
        tier: Tier::CodifiedStandards,
        key: "codified_standards",
        label: "Codified standards",
        authority: 3,
        currency: 1,
    },
    TierProfile {
        tier: Tier::InformalKnowledge,
        key: "informal_knowledge",
        label: "Informal knowledge",
        authority: 2,
        currency: 2,
    },
    TierProfile {
        tier: Tier::ExternalIntelligence,
        key: "external_intelligence",
        label: "External intelligence",
        authority: 1,
        currency: 3,
    },
];

impl Tier {
    /// All tiers in fixed report order
    pub const ALL: [Tier; 3] = [
        Tier::CodifiedStandards,
        Tier::InformalKnowledge,
        Tier::ExternalIntelligence,
    ];

    /// Position in fixed report order
    pub fn index(self) -> usize {
        match self {
            Tier::CodifiedStandards => 0,
            Tier::InformalKnowledge => 1,
            Tier::ExternalIntelligence => 2,
        }
    }

    pub fn profile(self) -> &'static TierProfile {
        &TIER_PROFILES[self.index()]
    }

    pub fn key(self) -> &'static str {
        self.profile().key
    }

    pub fn label(self) -> &'static str {
        self.profile().label
    }

    pub fn authority(self) -> u8 {
        self.profile().authority
    }

    pub fn currency(self) -> u8 {
        self.profile().currency
    }

    /// Parse a configuration key (`codified_standards`, ...)
    pub fn from_key(key: &str) -> Option<Tier> {
        TIER_PROFILES.iter().find(|p| p.key == key).map(|p| p.tier)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Fixed-size map with one slot per tier, iterated in report order
#[derive(Debug, Clone, PartialEq)]
pub struct TierMap<T>([T; 3]);

impl<T> TierMap<T> {
    pub fn from_fn(mut f: impl FnMut(Tier) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Tier::ALL[i])))
    }

    pub fn get(&self, tier: Tier) -> &T {
        &self.0[tier.index()]
    }

    pub fn get_mut(&mut self, tier: Tier) -> &mut T {
        &mut self.0[tier.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, &T)> {
        Tier::ALL.into_iter().zip(self.0.iter())
    }

    pub fn map<U>(self, mut f: impl FnMut(Tier, T) -> U) -> TierMap<U> {
        let mut values = Tier::ALL.into_iter().zip(self.0);
        TierMap(std::array::from_fn(|_| match values.next() {
            Some((tier, value)) => f(tier, value),
            None => unreachable!("TierMap always holds three values"),
        }))
    }
}

impl<T> IntoIterator for TierMap<T> {
    type Item = (Tier, T);
    type IntoIter = std::iter::Zip<std::array::IntoIter<Tier, 3>, std::array::IntoIter<T, 3>>;

    fn into_iter(self) -> Self::IntoIter {
        Tier::ALL.into_iter().zip(self.0)
    }
}

impl<T: Default> Default for TierMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

/// Set of tiers, iterated and serialized in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierSet([bool; 3]);

impl TierSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tier: Tier) {
        self.0[tier.index()] = true;
    }

    pub fn contains(&self, tier: Tier) -> bool {
        self.0[tier.index()]
    }

    pub fn len(&self) -> usize {
        self.0.iter().filter(|present| **present).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Tier> + '_ {
        Tier::ALL.into_iter().filter(|t| self.contains(*t))
    }

    /// True when this set holds exactly the given tiers
    pub fn is_exactly(&self, tiers: &[Tier]) -> bool {
        self.len() == tiers.len() && tiers.iter().all(|t| self.contains(*t))
    }
}

impl FromIterator<Tier> for TierSet {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut set = TierSet::empty();
        for tier in iter {
            set.insert(tier);
        }
        set
    }
}

impl Serialize for TierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for tier in self.iter() {
            seq.serialize_element(&tier)?;
        }
        seq.end()
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Finding severity (also used as reconciliation priority)
///
/// Ordering is by seriousness: `Critical > High > ... > Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    /// Report order, most severe first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tier statements and candidate violations (pipeline inputs)
// ============================================================================

/// Source reference for a requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    /// Source name (standard, document, regulation)
    pub source: String,
    /// Section, URL or page within the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

/// One tier's assertion about a requirement
///
/// Immutable once captured: the pipeline only ever reads or clones it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStatement {
    pub tier: Tier,
    /// Tier-supplied requirement identifier, used for exact topic matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<String>,
    /// Free-text requirement
    pub text: String,
    /// Structured values (e.g. `encryption_algorithm`, `retention_days`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<Citation>,
    /// When the tier last observed this requirement, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
    /// Requirement category (see severity table)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tier-declared severity, overrides the category table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_hint: Option<Severity>,
}

impl TierStatement {
    pub fn new(tier: Tier, text: impl Into<String>) -> Self {
        Self {
            tier,
            requirement_id: None,
            text: text.into(),
            fields: BTreeMap::new(),
            citation: None,
            observed_at: None,
            category: None,
            severity_hint: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.requirement_id = Some(id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_citation(mut self, source: impl Into<String>, locator: Option<&str>) -> Self {
        self.citation = Some(Citation {
            source: source.into(),
            locator: locator.map(str::to_string),
        });
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_severity_hint(mut self, severity: Severity) -> Self {
        self.severity_hint = Some(severity);
        self
    }

    /// Specificity used to pick a topic's canonical statement:
    /// more structured fields first, then longer text.
    pub fn specificity(&self) -> (usize, usize) {
        (self.fields.len(), self.text.trim().len())
    }
}

/// Inclusive, 1-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    /// Build a range, swapping reversed bounds and clamping to line 1
    pub fn new(start: u32, end: u32) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start: start.max(1),
            end: end.max(1),
        }
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Raw violation proposed by the reasoning agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateViolation {
    /// Requirement id or short phrase naming the violated requirement
    pub topic_hint: String,
    /// Path relative to the scan root
    pub file: String,
    pub line_range: LineRange,
    pub description: String,
    /// Tier whose statement the agent validated this candidate against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_against: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl CandidateViolation {
    pub fn new(
        topic_hint: impl Into<String>,
        file: impl Into<String>,
        line_range: LineRange,
        description: impl Into<String>,
    ) -> Self {
        Self {
            topic_hint: topic_hint.into(),
            file: file.into(),
            line_range,
            description: description.into(),
            validated_against: None,
            violation_type: None,
            category: None,
            remediation: None,
        }
    }

    pub fn validated_against(mut self, tier: Tier) -> Self {
        self.validated_against = Some(tier);
        self
    }
}

// ============================================================================
// Normalizer output
// ============================================================================

/// How a topic's statements were grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicMatch {
    /// Grouped by tier-supplied requirement id
    Exact,
    /// Grouped by text similarity
    Fuzzy,
}

/// Canonical grouping of equivalent requirement statements across tiers
///
/// Invariant: at most one statement per tier. Construct through
/// `RequirementTopic::new` + `attach` which enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementTopic {
    /// Stable identifier (slug)
    pub id: String,
    /// Canonical label, taken from the most specific statement
    pub label: String,
    pub match_kind: TopicMatch,
    /// Set when the fuzzy grouping was close to the threshold or contested
    pub low_confidence: bool,
    statements: TierMap<Option<TierStatement>>,
}

impl RequirementTopic {
    pub fn new(id: impl Into<String>, label: impl Into<String>, match_kind: TopicMatch) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            match_kind,
            low_confidence: false,
            statements: TierMap::default(),
        }
    }

    /// Attach a statement to its tier slot.
    ///
    /// If the tier already has a statement the more specific one is kept and
    /// the other is returned.
    pub fn attach(&mut self, statement: TierStatement) -> Option<TierStatement> {
        let slot = self.statements.get_mut(statement.tier);
        match slot.take() {
            None => {
                *slot = Some(statement);
                None
            }
            Some(existing) => {
                if statement.specificity() > existing.specificity() {
                    *slot = Some(statement);
                    Some(existing)
                } else {
                    *slot = Some(existing);
                    Some(statement)
                }
            }
        }
    }

    pub fn statement(&self, tier: Tier) -> Option<&TierStatement> {
        self.statements.get(tier).as_ref()
    }

    pub fn statements(&self) -> impl Iterator<Item = &TierStatement> {
        self.statements.iter().filter_map(|(_, s)| s.as_ref())
    }

    /// Tiers that asserted this topic
    pub fn tiers(&self) -> TierSet {
        self.statements().map(|s| s.tier).collect()
    }

    /// Most specific statement (ties go to the earlier tier)
    pub fn canonical_statement(&self) -> Option<&TierStatement> {
        self.statements()
            .fold(None, |best: Option<&TierStatement>, s| match best {
                Some(b) if b.specificity() >= s.specificity() => Some(b),
                _ => Some(s),
            })
    }
}

/// A concrete, located violation attributed to exactly one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub tier: Tier,
    pub severity: Severity,
    /// RequirementTopic id
    pub topic: String,
    pub file: String,
    pub line_range: LineRange,
    pub violation_type: String,
    pub description: String,
    /// The tier's requirement text
    pub requirement: String,
    pub citation: Option<Citation>,
    pub remediation: String,
}

// ============================================================================
// Ring availability
// ============================================================================

/// Whether a tier contributed to this scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Consulted,
    Unavailable,
}

/// Why a tier did not contribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    AuthDenied,
    ServiceUnavailable,
    NotConfigured,
    Timeout,
    MalformedResponse,
    /// Excluded by the ring selection, or never invoked by the agent
    NotRequested,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnavailableReason::AuthDenied => "auth_denied",
            UnavailableReason::ServiceUnavailable => "service_unavailable",
            UnavailableReason::NotConfigured => "not_configured",
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::MalformedResponse => "malformed_response",
            UnavailableReason::NotRequested => "not_requested",
        };
        f.write_str(s)
    }
}

/// Per-tier availability for one scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingAvailability {
    pub tier: Tier,
    pub status: AvailabilityStatus,
    pub reason: Option<UnavailableReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub statement_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl RingAvailability {
    pub fn consulted(tier: Tier, latency_ms: u64, statement_count: usize) -> Self {
        Self {
            tier,
            status: AvailabilityStatus::Consulted,
            reason: None,
            latency_ms: Some(latency_ms),
            statement_count,
            detail: None,
        }
    }

    pub fn unavailable(
        tier: Tier,
        reason: UnavailableReason,
        latency_ms: Option<u64>,
        detail: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        Self {
            tier,
            status: AvailabilityStatus::Unavailable,
            reason: Some(reason),
            latency_ms,
            statement_count: 0,
            detail: (!detail.is_empty()).then_some(detail),
        }
    }

    pub fn is_consulted(&self) -> bool {
        self.status == AvailabilityStatus::Consulted
    }
}

/// Exactly one availability entry per tier, always in fixed tier order
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityLedger(TierMap<RingAvailability>);

impl AvailabilityLedger {
    /// Build the ledger; each entry must describe the tier of its slot
    pub fn new(entries: TierMap<RingAvailability>) -> Result<Self, String> {
        for (tier, entry) in entries.iter() {
            if entry.tier != tier {
                return Err(format!(
                    "availability entry for {} stored in the {} slot",
                    entry.tier, tier
                ));
            }
        }
        Ok(Self(entries))
    }

    /// Every tier unavailable for the same reason
    pub fn all_unavailable(reason: UnavailableReason, detail: &str) -> Self {
        Self(TierMap::from_fn(|tier| {
            RingAvailability::unavailable(tier, reason, None, detail)
        }))
    }

    pub fn entry(&self, tier: Tier) -> &RingAvailability {
        self.0.get(tier)
    }

    pub fn entries(&self) -> impl Iterator<Item = &RingAvailability> {
        self.0.iter().map(|(_, e)| e)
    }

    /// Update a consulted tier's statement count; unavailable entries keep zero
    pub fn record_statement_count(&mut self, tier: Tier, count: usize) {
        let entry = self.0.get_mut(tier);
        if entry.is_consulted() {
            entry.statement_count = count;
        }
    }

    /// Tiers that were actually consulted
    pub fn consulted(&self) -> TierSet {
        self.entries()
            .filter(|e| e.is_consulted())
            .map(|e| e.tier)
            .collect()
    }
}

impl Serialize for AvailabilityLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(3))?;
        for entry in self.entries() {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}

// ============================================================================
// Reconciliation output
// ============================================================================

/// Cross-tier gap classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapClass {
    CodificationGap,
    UnverifiedProvenanceGap,
    CriticalUntrackedGap,
    SupersededStandardConflict,
}

impl GapClass {
    pub const ALL: [GapClass; 4] = [
        GapClass::CodificationGap,
        GapClass::UnverifiedProvenanceGap,
        GapClass::CriticalUntrackedGap,
        GapClass::SupersededStandardConflict,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GapClass::CodificationGap => "codification_gap",
            GapClass::UnverifiedProvenanceGap => "unverified_provenance_gap",
            GapClass::CriticalUntrackedGap => "critical_untracked_gap",
            GapClass::SupersededStandardConflict => "superseded_standard_conflict",
        }
    }

    /// Recommended action
    pub fn recommendation(self) -> &'static str {
        match self {
            GapClass::CodificationGap => "codify into organizational standard",
            GapClass::UnverifiedProvenanceGap => {
                "verify whether this is internal policy or a regulatory obligation"
            }
            GapClass::CriticalUntrackedGap => {
                "regulatory requirement not tracked anywhere internally"
            }
            GapClass::SupersededStandardConflict => {
                "update the codified standard to the current value; the codified value remains the baseline until then"
            }
        }
    }

    pub fn priority(self) -> Severity {
        match self {
            GapClass::CriticalUntrackedGap => Severity::Critical,
            GapClass::SupersededStandardConflict => Severity::High,
            GapClass::UnverifiedProvenanceGap => Severity::Medium,
            GapClass::CodificationGap => Severity::Medium,
        }
    }
}

impl fmt::Display for GapClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value observed by one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierValue {
    pub tier: Tier,
    pub value: String,
}

/// Structured field on which codified standards and a more current tier disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueConflict {
    pub field: String,
    /// Codified value (current baseline, never overwritten)
    pub baseline: String,
    /// Most current tier's value (recommended target)
    pub target: String,
    pub target_tier: Tier,
    /// Every tier's value for the field, in tier order
    pub observed: Vec<TierValue>,
}

/// Derived cross-tier gap classification for one topic
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationRecord {
    pub topic: String,
    pub label: String,
    pub classification: GapClass,
    pub tiers_present: TierSet,
    pub tiers_consulted: TierSet,
    pub recommendation: String,
    pub priority: Severity,
    pub low_confidence: bool,
    /// Findings (one per tier) that make up this logical issue
    pub finding_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value_conflicts: Vec<ValueConflict>,
}
