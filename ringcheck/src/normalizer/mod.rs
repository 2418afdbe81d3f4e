//! Finding normalizer
//!
//! Turns tier statements and raw candidate violations into requirement
//! topics and tier-attributed findings. Pure and synchronous: the same input
//! always produces the same output, in the same order.
//!
//! # Attribution
//! A candidate validated against one tier yields one finding for that tier.
//! A candidate without a declared tier yields one finding per tier that
//! asserted the topic, so a location violating the requirements of N tiers
//! produces N findings. Findings of different tiers are never merged.
//!
//! # Deduplication
//! Within a tier, findings with the same topic, file and line range collapse
//! into one, keeping the higher severity.

pub mod severity;
pub mod topics;

pub use severity::RequirementCategory;
pub use topics::{build_topics, normalize_id, resolve_hint, HintMatch, Signature};

use crate::types::{
    CandidateViolation, Finding, RequirementTopic, Tier, TierSet, TierStatement,
};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedScan {
    pub topics: Vec<RequirementTopic>,
    pub findings: Vec<Finding>,
    /// Candidates that matched no topic
    pub unattributed: Vec<CandidateViolation>,
}

/// Normalize statements and candidates
///
/// # Arguments
/// * `statements` - Statements from consulted tiers only
/// * `candidates` - Raw agent output
pub fn normalize(statements: &[TierStatement], candidates: &[CandidateViolation]) -> NormalizedScan {
    let mut topics = build_topics(statements);
    let mut findings: BTreeMap<String, Finding> = BTreeMap::new();
    let mut unattributed = Vec::new();

    for candidate in candidates {
        let Some(matched) = resolve_hint(&topics, &candidate.topic_hint, &candidate.description)
        else {
            debug!(topic_hint = %candidate.topic_hint, file = %candidate.file, "Candidate matched no topic");
            unattributed.push(candidate.clone());
            continue;
        };
        if matched.low_confidence {
            debug!(
                topic_hint = %candidate.topic_hint,
                topic = %topics[matched.index].id,
                "Candidate topic match is low confidence"
            );
            topics[matched.index].low_confidence = true;
        }
        let topic = &topics[matched.index];

        for tier in attributed_tiers(topic, candidate).iter() {
            let Some(statement) = topic.statement(tier) else {
                continue;
            };
            let finding = build_finding(topic, statement, candidate);
            match findings.get_mut(&finding.id) {
                Some(existing) if existing.severity >= finding.severity => {}
                Some(existing) => *existing = finding,
                None => {
                    findings.insert(finding.id.clone(), finding);
                }
            }
        }
    }

    let mut findings: Vec<Finding> = findings.into_values().collect();
    findings.sort_by(|a, b| {
        (&a.file, a.line_range, &a.topic, a.tier.index())
            .cmp(&(&b.file, b.line_range, &b.topic, b.tier.index()))
    });

    info!(
        topics = topics.len(),
        findings = findings.len(),
        unattributed = unattributed.len(),
        "Normalization complete"
    );

    NormalizedScan {
        topics,
        findings,
        unattributed,
    }
}

/// Tiers a candidate is attributed to
///
/// A declared tier that did not assert the topic falls back to every tier
/// that did.
fn attributed_tiers(topic: &RequirementTopic, candidate: &CandidateViolation) -> TierSet {
    let present = topic.tiers();
    match candidate.validated_against {
        Some(tier) if present.contains(tier) => [tier].into_iter().collect(),
        Some(tier) => {
            debug!(
                topic = %topic.id,
                declared = %tier,
                "Declared tier did not assert this topic, attributing to all asserting tiers"
            );
            present
        }
        None => present,
    }
}

fn build_finding(
    topic: &RequirementTopic,
    statement: &TierStatement,
    candidate: &CandidateViolation,
) -> Finding {
    let signature = Signature::of(&statement.text);
    let inferred = RequirementCategory::infer(signature.action, &signature.subject);
    let severity = severity::resolve_severity(
        statement.severity_hint,
        &[statement.category.as_deref(), candidate.category.as_deref()],
        inferred,
    );

    let violation_type = candidate
        .violation_type
        .clone()
        .or_else(|| {
            statement
                .category
                .as_deref()
                .or(candidate.category.as_deref())
                .and_then(RequirementCategory::parse)
                .or(inferred)
                .map(|c| c.key().to_string())
        })
        .unwrap_or_else(|| "policy-violation".to_string());

    let remediation = candidate
        .remediation
        .clone()
        .unwrap_or_else(|| default_remediation(&signature, statement));

    Finding {
        id: finding_id(statement.tier, &topic.id, candidate),
        tier: statement.tier,
        severity,
        topic: topic.id.clone(),
        file: candidate.file.clone(),
        line_range: candidate.line_range,
        violation_type,
        description: candidate.description.clone(),
        requirement: statement.text.clone(),
        citation: statement.citation.clone(),
        remediation,
    }
}

/// Stable id: `F-` + 12 hex digits of SHA-256 over tier, topic and location
pub fn finding_id(tier: Tier, topic: &str, candidate: &CandidateViolation) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tier.key().as_bytes());
    hasher.update(b"|");
    hasher.update(topic.as_bytes());
    hasher.update(b"|");
    hasher.update(candidate.file.as_bytes());
    hasher.update(b"|");
    hasher.update(candidate.line_range.to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("F-{}", &digest[..12])
}

fn default_remediation(signature: &Signature, statement: &TierStatement) -> String {
    let subject = if signature.subject.is_empty() {
        "the affected data".to_string()
    } else {
        signature.subject.join(" ")
    };
    let action = match signature.action {
        Some("encrypt") => format!("Encrypt {}", subject),
        Some("retain") => format!("Apply the required retention period to {}", subject),
        Some("audit-log") => format!("Bring logging of {} in line with the requirement", subject),
        Some("consent") => format!("Obtain and record consent before processing {}", subject),
        Some("assess") => format!("Complete the required assessment for {}", subject),
        Some("mask") => format!("Mask or redact {}", subject),
        Some("delete") => format!("Implement deletion of {}", subject),
        Some("restrict-access") => format!("Restrict access to {}", subject),
        Some("notify") => format!("Implement notification for {}", subject),
        Some("document") => format!("Document {}", subject),
        _ => format!("Bring the code in line with: {}", statement.text),
    };
    match &statement.citation {
        Some(citation) => format!("{} ({})", action, citation.source),
        None => action,
    }
}
