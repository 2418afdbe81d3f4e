//! Requirement topic matching
//!
//! Statements group into topics in two passes:
//! 1. **Exact** - statements sharing a normalized requirement id
//! 2. **Fuzzy** - id groups and id-less statements merge across tiers by
//!    action + subject similarity
//!
//! Score: 0 if both sides name different actions, otherwise
//! `0.6 × Jaccard(subject) + 0.4 × normalized Levenshtein(sorted subject)`.

use crate::types::{RequirementTopic, TierSet, TierStatement, TopicMatch};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use strsim::normalized_levenshtein;
use tracing::debug;

/// Minimum score for a fuzzy match
pub const MATCH_THRESHOLD: f64 = 0.55;

/// Fuzzy matches below this score are flagged low confidence
pub const CONFIDENT_SCORE: f64 = 0.65;

/// Runner-up within this margin makes a match low confidence
pub const CONTESTED_MARGIN: f64 = 0.05;

/// Score needed to collapse an id-less statement into a topic that already
/// holds a statement from the same tier
pub const COLLAPSE_THRESHOLD: f64 = 0.85;

/// Maximum subject words used in generated topic ids
const SLUG_WORDS: usize = 4;

const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "as", "at", "be", "by", "for", "from", "has",
    "have", "in", "into", "is", "it", "its", "must", "never", "no", "not", "of", "on", "or",
    "our", "shall", "should", "such", "that", "the", "their", "them", "these", "this", "those",
    "to", "under", "using", "via", "when", "where", "which", "will", "with", "within", "without",
];

/// Synonyms → canonical action (matched after stemming)
const ACTION_LEXICON: &[(&str, &str)] = &[
    ("encrypt", "encrypt"),
    ("encrypted", "encrypt"),
    ("encryption", "encrypt"),
    ("encrypting", "encrypt"),
    ("cipher", "encrypt"),
    ("retain", "retain"),
    ("retained", "retain"),
    ("retention", "retain"),
    ("keep", "retain"),
    ("audit", "audit-log"),
    ("audited", "audit-log"),
    ("auditing", "audit-log"),
    ("log", "audit-log"),
    ("logged", "audit-log"),
    ("logging", "audit-log"),
    ("consent", "consent"),
    ("opt", "consent"),
    ("assess", "assess"),
    ("assessment", "assess"),
    ("dpia", "assess"),
    ("evaluate", "assess"),
    ("mask", "mask"),
    ("masked", "mask"),
    ("masking", "mask"),
    ("redact", "mask"),
    ("redaction", "mask"),
    ("anonymize", "mask"),
    ("pseudonymize", "mask"),
    ("delete", "delete"),
    ("deletion", "delete"),
    ("erase", "delete"),
    ("erasure", "delete"),
    ("purge", "delete"),
    ("restrict", "restrict-access"),
    ("authorize", "restrict-access"),
    ("authorization", "restrict-access"),
    ("rbac", "restrict-access"),
    ("permission", "restrict-access"),
    ("notify", "notify"),
    ("notification", "notify"),
    ("document", "document"),
    ("documentation", "document"),
    ("documented", "document"),
];

/// Normalize a requirement id or hint: lowercase, non-alphanumeric runs → `-`
pub fn normalize_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn stem(word: &str) -> String {
    if word.len() > 4 && word.ends_with("ies") {
        format!("{}y", &word[..word.len() - 3])
    } else if word.len() > 4
        && ["sses", "ches", "shes", "xes"].iter().any(|suffix| word.ends_with(suffix))
    {
        word[..word.len() - 2].to_string()
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us")
    {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn canonical_action(word: &str) -> Option<&'static str> {
    ACTION_LEXICON
        .iter()
        .find(|(synonym, _)| *synonym == word)
        .map(|(_, action)| *action)
}

/// Action + subject extracted from requirement text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub action: Option<&'static str>,
    /// Sorted, de-duplicated subject words
    pub subject: Vec<String>,
}

impl Signature {
    pub fn of(text: &str) -> Self {
        let mut action = None;
        let mut subject = BTreeSet::new();

        for raw in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = stem(&raw.to_lowercase());
            if word.chars().count() < 2 || STOP_WORDS.contains(&word.as_str()) {
                continue;
            }
            match canonical_action(&word) {
                Some(found) => {
                    if action.is_none() {
                        action = Some(found);
                    }
                }
                None => {
                    subject.insert(word);
                }
            }
        }

        Self {
            action,
            subject: subject.into_iter().collect(),
        }
    }

    /// Similarity score in `[0, 1]`
    pub fn score(&self, other: &Signature) -> f64 {
        if let (Some(a), Some(b)) = (self.action, other.action) {
            if a != b {
                return 0.0;
            }
        }
        if self.subject.is_empty() && other.subject.is_empty() {
            return if self.action.is_some() && self.action == other.action {
                1.0
            } else {
                0.0
            };
        }

        let left: HashSet<&String> = self.subject.iter().collect();
        let right: HashSet<&String> = other.subject.iter().collect();
        let union = left.union(&right).count();
        let jaccard = if union == 0 {
            0.0
        } else {
            left.intersection(&right).count() as f64 / union as f64
        };
        let edit = normalized_levenshtein(&self.subject.join(" "), &other.subject.join(" "));

        0.6 * jaccard + 0.4 * edit
    }

    /// Topic slug: action followed by the first subject words
    pub fn slug(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(action) = self.action {
            parts.push(action);
        }
        parts.extend(self.subject.iter().take(SLUG_WORDS).map(String::as_str));
        let slug = normalize_id(&parts.join(" "));
        if slug.is_empty() {
            "requirement".to_string()
        } else {
            slug
        }
    }
}

/// Statements grouped before fuzzy merging
#[derive(Debug, Clone)]
struct Unit {
    /// Normalized id for exact groups
    id: Option<String>,
    statements: Vec<TierStatement>,
}

impl Unit {
    fn tiers(&self) -> TierSet {
        self.statements.iter().map(|s| s.tier).collect()
    }
}

/// Topic under construction with cached signatures
struct Draft {
    topic: RequirementTopic,
    signatures: Vec<Signature>,
}

impl Draft {
    fn score(&self, signatures: &[Signature]) -> f64 {
        self.signatures
            .iter()
            .flat_map(|a| signatures.iter().map(move |b| a.score(b)))
            .fold(0.0, f64::max)
    }
}

/// Group statements into requirement topics
///
/// Deterministic: the input order does not matter, statements are sorted by
/// tier, id and text before grouping.
pub fn build_topics(statements: &[TierStatement]) -> Vec<RequirementTopic> {
    let mut sorted: Vec<&TierStatement> = statements.iter().collect();
    sorted.sort_by(|a, b| {
        (a.tier.index(), a.requirement_id.as_deref().map(normalize_id), &a.text)
            .cmp(&(b.tier.index(), b.requirement_id.as_deref().map(normalize_id), &b.text))
    });

    // Pass 1: exact id groups, then id-less singles
    let mut groups: BTreeMap<String, Vec<TierStatement>> = BTreeMap::new();
    let mut singles = Vec::new();
    for statement in sorted {
        match statement.requirement_id.as_deref().map(normalize_id) {
            Some(id) if !id.is_empty() => groups.entry(id).or_default().push(statement.clone()),
            _ => singles.push(statement.clone()),
        }
    }

    let units = groups
        .into_iter()
        .map(|(id, statements)| Unit {
            id: Some(id),
            statements,
        })
        .chain(singles.into_iter().map(|s| Unit {
            id: None,
            statements: vec![s],
        }));

    // Pass 2: fuzzy merge across tiers
    let mut drafts: Vec<Draft> = Vec::new();
    let mut used_ids: HashSet<String> = HashSet::new();

    for unit in units {
        let signatures: Vec<Signature> =
            unit.statements.iter().map(|s| Signature::of(&s.text)).collect();
        let unit_tiers = unit.tiers();

        let mut scored: Vec<(usize, f64)> = drafts
            .iter()
            .enumerate()
            .filter_map(|(index, draft)| {
                let score = draft.score(&signatures);
                let overlaps = unit_tiers.iter().any(|t| draft.topic.tiers().contains(t));
                let eligible = if overlaps {
                    unit.id.is_none() && score >= COLLAPSE_THRESHOLD
                } else {
                    score >= MATCH_THRESHOLD
                };
                eligible.then_some((index, score))
            })
            .collect();
        // Highest score first; earlier topic wins ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        match scored.first().copied() {
            Some((index, score)) => {
                let runner_up = scored.get(1).map(|(_, s)| *s);
                let contested = runner_up.is_some_and(|r| score - r < CONTESTED_MARGIN);
                let draft = &mut drafts[index];
                debug!(
                    topic = %draft.topic.id,
                    score,
                    contested,
                    "Fuzzy topic match"
                );
                draft.topic.match_kind = TopicMatch::Fuzzy;
                if score < CONFIDENT_SCORE || contested {
                    draft.topic.low_confidence = true;
                }
                for statement in unit.statements {
                    draft.topic.attach(statement);
                }
                draft.signatures.extend(signatures);
            }
            None => {
                let base = match &unit.id {
                    Some(id) => id.clone(),
                    None => signatures
                        .first()
                        .map(Signature::slug)
                        .unwrap_or_else(|| "requirement".to_string()),
                };
                let id = unique_id(base, &mut used_ids);
                let kind = if unit.id.is_some() {
                    TopicMatch::Exact
                } else {
                    TopicMatch::Fuzzy
                };
                let mut topic = RequirementTopic::new(id.clone(), id, kind);
                for statement in unit.statements {
                    topic.attach(statement);
                }
                drafts.push(Draft { topic, signatures });
            }
        }
    }

    drafts
        .into_iter()
        .map(|draft| {
            let mut topic = draft.topic;
            if let Some(canonical) = topic.canonical_statement() {
                topic.label = canonical.text.clone();
            }
            topic
        })
        .collect()
}

fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Topic chosen for a candidate hint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintMatch {
    pub index: usize,
    /// Fuzzy match that was weak or nearly tied with another topic
    pub low_confidence: bool,
}

/// Resolve a candidate's topic hint to a topic
///
/// Topic ids and member requirement ids match first; otherwise the best fuzzy
/// match at or above the threshold. A fuzzy match below `CONFIDENT_SCORE`, or
/// one whose runner-up scores within `CONTESTED_MARGIN`, is low confidence.
/// Ties go to the earlier topic.
pub fn resolve_hint(topics: &[RequirementTopic], hint: &str, description: &str) -> Option<HintMatch> {
    let normalized = normalize_id(hint);
    if !normalized.is_empty() {
        let exact = topics.iter().position(|topic| {
            topic.id == normalized
                || topic.statements().any(|s| {
                    s.requirement_id.as_deref().map(normalize_id).as_deref()
                        == Some(normalized.as_str())
                })
        });
        if let Some(index) = exact {
            return Some(HintMatch {
                index,
                low_confidence: false,
            });
        }
    }

    // Hyphenated hints read as words for fuzzy matching
    let by_hint = best_fuzzy(topics, &Signature::of(hint));
    by_hint.or_else(|| best_fuzzy(topics, &Signature::of(description)))
}

fn best_fuzzy(topics: &[RequirementTopic], signature: &Signature) -> Option<HintMatch> {
    let mut scored: Vec<(usize, f64)> = topics
        .iter()
        .enumerate()
        .map(|(index, topic)| {
            let score = topic
                .statements()
                .map(|s| Signature::of(&s.text).score(signature))
                .fold(0.0, f64::max);
            (index, score)
        })
        .filter(|(_, score)| *score >= MATCH_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let (index, score) = scored.first().copied()?;
    let contested = scored
        .get(1)
        .is_some_and(|(_, runner_up)| score - runner_up < CONTESTED_MARGIN);
    if contested {
        debug!(topic = %topics[index].id, score, "Topic hint matched several topics");
    }
    Some(HintMatch {
        index,
        low_confidence: contested || score < CONFIDENT_SCORE,
    })
}
