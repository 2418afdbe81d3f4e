//! Cross-tier reconciliation
//!
//! Classifies every topic by which authority levels know about it. The
//! availability ledger gates everything: a tier that was not consulted is
//! never counted as "absent", so its silence cannot produce a gap.
//!
//! | Present in              | Also consulted | Classification               |
//! |-------------------------|----------------|------------------------------|
//! | codified + newer tier   | -              | superseded standard conflict (values differ) |
//! | informal only           | external       | unverified provenance gap    |
//! | external only           | informal       | critical untracked gap       |
//! | informal and/or external| -              | codification gap             |
//!
//! Nothing is classified when codified standards were not consulted, and
//! topics whose values agree everywhere produce no record.

use crate::types::{
    AvailabilityLedger, Finding, GapClass, ReconciliationRecord, RequirementTopic, Tier, TierSet,
    TierValue, ValueConflict,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Classify all topics
///
/// # Arguments
/// * `topics` - Normalizer topics
/// * `findings` - Normalizer findings (linked into records by topic)
/// * `ledger` - Availability ledger for this scan
///
/// # Returns
/// Records ordered by priority (highest first), then topic id.
pub fn reconcile(
    topics: &[RequirementTopic],
    findings: &[Finding],
    ledger: &AvailabilityLedger,
) -> Vec<ReconciliationRecord> {
    let consulted = ledger.consulted();
    let mut records: Vec<ReconciliationRecord> = topics
        .iter()
        .filter_map(|topic| classify(topic, consulted).map(|c| (topic, c)))
        .map(|(topic, (classification, value_conflicts))| {
            let finding_ids = findings
                .iter()
                .filter(|f| f.topic == topic.id)
                .map(|f| f.id.clone())
                .collect();
            ReconciliationRecord {
                topic: topic.id.clone(),
                label: topic.label.clone(),
                classification,
                tiers_present: present_tiers(topic, consulted),
                tiers_consulted: consulted,
                recommendation: recommendation(classification, &value_conflicts),
                priority: classification.priority(),
                low_confidence: topic.low_confidence,
                finding_ids,
                value_conflicts,
            }
        })
        .collect();

    records.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.topic.cmp(&b.topic)));

    info!(
        topics = topics.len(),
        records = records.len(),
        consulted = consulted.len(),
        "Reconciliation complete"
    );
    records
}

/// Tiers asserting the topic, restricted to consulted tiers
fn present_tiers(topic: &RequirementTopic, consulted: TierSet) -> TierSet {
    topic.tiers().iter().filter(|t| consulted.contains(*t)).collect()
}

fn classify(
    topic: &RequirementTopic,
    consulted: TierSet,
) -> Option<(GapClass, Vec<ValueConflict>)> {
    if !consulted.contains(Tier::CodifiedStandards) {
        debug!(topic = %topic.id, "Codified standards not consulted, no classification");
        return None;
    }

    let present = present_tiers(topic, consulted);
    if present.is_empty() {
        return None;
    }

    if present.contains(Tier::CodifiedStandards) {
        let conflicts = value_conflicts(topic, present);
        return (!conflicts.is_empty())
            .then_some((GapClass::SupersededStandardConflict, conflicts));
    }

    let classification = if present.is_exactly(&[Tier::InformalKnowledge])
        && consulted.contains(Tier::ExternalIntelligence)
    {
        GapClass::UnverifiedProvenanceGap
    } else if present.is_exactly(&[Tier::ExternalIntelligence])
        && consulted.contains(Tier::InformalKnowledge)
    {
        GapClass::CriticalUntrackedGap
    } else {
        GapClass::CodificationGap
    };
    Some((classification, Vec::new()))
}

/// Structured fields where a more current tier disagrees with the codified baseline
fn value_conflicts(topic: &RequirementTopic, present: TierSet) -> Vec<ValueConflict> {
    let Some(codified) = topic.statement(Tier::CodifiedStandards) else {
        return Vec::new();
    };

    // Normalized field key -> (tier, original key, value) in tier order
    let mut by_field: BTreeMap<String, Vec<(Tier, &str, &str)>> = BTreeMap::new();
    for tier in present.iter() {
        if let Some(statement) = topic.statement(tier) {
            for (key, value) in &statement.fields {
                by_field
                    .entry(normalize_key(key))
                    .or_default()
                    .push((tier, key.as_str(), value.as_str()));
            }
        }
    }

    let mut conflicts = Vec::new();
    for (key, baseline) in &codified.fields {
        let Some(observed) = by_field.get(&normalize_key(key)) else {
            continue;
        };

        // Most current tier whose value departs from the baseline
        let target = observed
            .iter()
            .filter(|(tier, _, _)| tier.currency() > Tier::CodifiedStandards.currency())
            .filter(|(_, _, value)| !values_equal(baseline, value))
            .max_by_key(|(tier, _, _)| tier.currency());
        let Some((target_tier, _, target_value)) = target else {
            continue;
        };

        debug!(
            topic = %topic.id,
            field = %key,
            baseline = %baseline,
            target = %target_value,
            target_tier = %target_tier,
            "Codified value superseded"
        );
        conflicts.push(ValueConflict {
            field: key.clone(),
            baseline: baseline.clone(),
            target: target_value.to_string(),
            target_tier: *target_tier,
            observed: observed
                .iter()
                .map(|(tier, _, value)| TierValue {
                    tier: *tier,
                    value: value.to_string(),
                })
                .collect(),
        });
    }
    conflicts
}

fn recommendation(classification: GapClass, conflicts: &[ValueConflict]) -> String {
    let base = classification.recommendation();
    if conflicts.is_empty() {
        return base.to_string();
    }
    let details: Vec<String> = conflicts
        .iter()
        .map(|c| {
            format!(
                "{}: {} -> {} ({})",
                c.field,
                c.baseline,
                c.target,
                c.target_tier.label()
            )
        })
        .collect();
    format!("{} [{}]", base, details.join("; "))
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare values ignoring case and separators; numbers compare numerically
fn values_equal(a: &str, b: &str) -> bool {
    if let (Ok(x), Ok(y)) = (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        return x == y;
    }
    normalize_key(a) == normalize_key(b)
}
