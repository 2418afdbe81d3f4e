//! Report assembly
//!
//! Pure aggregation over what earlier stages produced. The assembler checks
//! the cross-stage invariants before building the report:
//! - the ledger holds exactly one entry per tier, in fixed order
//! - every finding comes from a consulted tier and names a known topic
//! - every reconciliation record names a known topic and only consulted tiers
//!
//! A violated invariant is an internal contract breach: the scan is reported
//! empty with `assemblyError` set instead of emitting a partial report.

use crate::types::{
    AvailabilityLedger, Finding, GapClass, ReconciliationRecord, RequirementTopic, Severity, Tier,
};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Internal contract breach detected during assembly
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("Ledger entry for {found} found where {expected} was expected")]
    LedgerOrder { expected: Tier, found: Tier },

    #[error("Finding {finding} attributed to tier {tier}, which was not consulted")]
    UnconsultedTier { finding: String, tier: Tier },

    #[error("Finding {finding} references unknown topic {topic}")]
    UnknownTopic { finding: String, topic: String },

    #[error("Reconciliation record references unknown topic {0}")]
    UnknownRecordTopic(String),

    #[error("Reconciliation record for {topic} uses unconsulted tier {tier}")]
    RecordUsesUnconsultedTier { topic: String, tier: Tier },
}

/// Keys with a fixed report order
pub trait CountKey: Copy + 'static {
    const ORDER: &'static [Self];
    fn key(self) -> &'static str;
    fn same(self, other: Self) -> bool;
}

impl CountKey for Tier {
    const ORDER: &'static [Self] = &Tier::ALL;
    fn key(self) -> &'static str {
        Tier::key(self)
    }
    fn same(self, other: Self) -> bool {
        self == other
    }
}

impl CountKey for Severity {
    const ORDER: &'static [Self] = &Severity::ALL;
    fn key(self) -> &'static str {
        self.as_str()
    }
    fn same(self, other: Self) -> bool {
        self == other
    }
}

impl CountKey for GapClass {
    const ORDER: &'static [Self] = &GapClass::ALL;
    fn key(self) -> &'static str {
        self.as_str()
    }
    fn same(self, other: Self) -> bool {
        self == other
    }
}

/// Counter map with every key present, serialized in fixed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedCounts<K: CountKey> {
    counts: Vec<(K, usize)>,
}

impl<K: CountKey> OrderedCounts<K> {
    pub fn tally(items: impl IntoIterator<Item = K>) -> Self {
        let mut counts: Vec<(K, usize)> = K::ORDER.iter().map(|k| (*k, 0)).collect();
        for item in items {
            if let Some(slot) = counts.iter_mut().find(|(k, _)| k.same(item)) {
                slot.1 += 1;
            }
        }
        Self { counts }
    }

    pub fn get(&self, key: K) -> usize {
        self.counts
            .iter()
            .find(|(k, _)| k.same(key))
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

impl<K: CountKey> Serialize for OrderedCounts<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (key, count) in &self.counts {
            map.serialize_entry(key.key(), count)?;
        }
        map.end()
    }
}

/// Report summary counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_findings: usize,
    pub by_tier: OrderedCounts<Tier>,
    pub by_severity: OrderedCounts<Severity>,
    pub by_gap_class: OrderedCounts<GapClass>,
    pub tiers_consulted: usize,
    pub unattributed_candidates: usize,
}

impl ReportSummary {
    fn tally(
        ledger: &AvailabilityLedger,
        findings: &[Finding],
        records: &[ReconciliationRecord],
        unattributed: usize,
    ) -> Self {
        Self {
            total_findings: findings.len(),
            by_tier: OrderedCounts::tally(findings.iter().map(|f| f.tier)),
            by_severity: OrderedCounts::tally(findings.iter().map(|f| f.severity)),
            by_gap_class: OrderedCounts::tally(records.iter().map(|r| r.classification)),
            tiers_consulted: ledger.consulted().len(),
            unattributed_candidates: unattributed,
        }
    }
}

/// Scan metadata supplied by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMetadata {
    pub scan_id: Uuid,
    pub scan_path: String,
    pub timestamp: DateTime<Utc>,
    pub mode: String,
    pub duration_ms: u64,
}

/// Root aggregate of a scan
///
/// Built once by [`assemble`] and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    scan_id: Uuid,
    scan_path: String,
    timestamp: DateTime<Utc>,
    mode: String,
    duration_ms: u64,
    engine_version: String,
    ring_availability: AvailabilityLedger,
    findings: Vec<Finding>,
    reconciliation: Vec<ReconciliationRecord>,
    summary: ReportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    assembly_error: Option<String>,
}

impl ComplianceReport {
    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    pub fn scan_path(&self) -> &str {
        &self.scan_path
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn engine_version(&self) -> &str {
        &self.engine_version
    }

    pub fn ring_availability(&self) -> &AvailabilityLedger {
        &self.ring_availability
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn reconciliation(&self) -> &[ReconciliationRecord] {
        &self.reconciliation
    }

    pub fn summary(&self) -> &ReportSummary {
        &self.summary
    }

    pub fn assembly_error(&self) -> Option<&str> {
        self.assembly_error.as_deref()
    }

    /// Pretty JSON for the external renderer
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON, creating parent directories
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Inputs to assembly
pub struct AssemblyInput<'a> {
    pub metadata: ScanMetadata,
    pub ledger: AvailabilityLedger,
    pub topics: &'a [RequirementTopic],
    pub findings: Vec<Finding>,
    pub records: Vec<ReconciliationRecord>,
    pub unattributed: usize,
}

/// Build the report, or an empty report flagged with the breach
pub fn assemble(input: AssemblyInput<'_>) -> ComplianceReport {
    let AssemblyInput {
        metadata,
        ledger,
        topics,
        findings,
        records,
        unattributed,
    } = input;

    let (findings, records, unattributed, assembly_error) =
        match verify(&ledger, topics, &findings, &records) {
            Ok(()) => (findings, records, unattributed, None),
            Err(e) => {
                error!(error = %e, "Internal contract breach, reporting empty scan");
                (Vec::new(), Vec::new(), 0, Some(e.to_string()))
            }
        };

    let summary = ReportSummary::tally(&ledger, &findings, &records, unattributed);
    info!(
        scan_id = %metadata.scan_id,
        findings = summary.total_findings,
        records = records.len(),
        tiers_consulted = summary.tiers_consulted,
        "Report assembled"
    );

    ComplianceReport {
        scan_id: metadata.scan_id,
        scan_path: metadata.scan_path,
        timestamp: metadata.timestamp,
        mode: metadata.mode,
        duration_ms: metadata.duration_ms,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        ring_availability: ledger,
        findings,
        reconciliation: records,
        summary,
        assembly_error,
    }
}

/// Check cross-stage invariants
pub fn verify(
    ledger: &AvailabilityLedger,
    topics: &[RequirementTopic],
    findings: &[Finding],
    records: &[ReconciliationRecord],
) -> Result<(), AssemblyError> {
    for (expected, entry) in Tier::ALL.into_iter().zip(ledger.entries()) {
        if entry.tier != expected {
            return Err(AssemblyError::LedgerOrder {
                expected,
                found: entry.tier,
            });
        }
    }

    let consulted = ledger.consulted();
    let topic_ids: HashSet<&str> = topics.iter().map(|t| t.id.as_str()).collect();

    for finding in findings {
        if !consulted.contains(finding.tier) {
            return Err(AssemblyError::UnconsultedTier {
                finding: finding.id.clone(),
                tier: finding.tier,
            });
        }
        if !topic_ids.contains(finding.topic.as_str()) {
            return Err(AssemblyError::UnknownTopic {
                finding: finding.id.clone(),
                topic: finding.topic.clone(),
            });
        }
    }

    for record in records {
        if !topic_ids.contains(record.topic.as_str()) {
            return Err(AssemblyError::UnknownRecordTopic(record.topic.clone()));
        }
        if let Some(tier) = record.tiers_present.iter().find(|t| !consulted.contains(*t)) {
            return Err(AssemblyError::RecordUsesUnconsultedTier {
                topic: record.topic.clone(),
                tier,
            });
        }
    }

    Ok(())
}
