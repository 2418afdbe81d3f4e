//! End-to-end gap scenarios
//!
//! Each test drives a full scan (orchestration, agent, normalization,
//! reconciliation, assembly) against mock tiers.

mod helpers;

use helpers::*;
use ringcheck::agent::{ApprovalPolicy, ReasoningAgent};
use ringcheck::scan::{ScanEngine, ScanRequest};
use ringcheck::tiers::{TierClient, TierFailureKind, TierSlots};
use ringcheck::types::{
    AvailabilityStatus, CandidateViolation, GapClass, LineRange, Severity, Tier, UnavailableReason,
};
use ringcheck_common::config::ScanMode;
use std::sync::Arc;

fn consent_candidate() -> CandidateViolation {
    CandidateViolation::new(
        "biometric-consent",
        "src/user.py",
        LineRange::new(1, 3),
        "fingerprint template stored without a consent record",
    )
}

// ============================================================================
// Scenario A: codification gap
// ============================================================================

#[tokio::test]
async fn test_scenario_a_codification_gap() {
    let root = scan_root();
    let engine = engine(
        &[
            MockTier::succeed(Tier::CodifiedStandards, vec![ssn_statement(Tier::CodifiedStandards, "AES-256")]),
            MockTier::succeed(Tier::InformalKnowledge, vec![consent_statement(Tier::InformalKnowledge)]),
            MockTier::succeed(
                Tier::ExternalIntelligence,
                vec![consent_statement(Tier::ExternalIntelligence)],
            ),
        ],
        Some(ScriptedAgent::emitting(vec![consent_candidate()])),
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert!(report.assembly_error().is_none());
    assert_eq!(report.reconciliation().len(), 1);
    let record = &report.reconciliation()[0];
    assert_eq!(record.topic, "biometric-consent");
    assert_eq!(record.classification, GapClass::CodificationGap);
    assert!(record.recommendation.starts_with("codify"));
    assert!(record
        .tiers_present
        .is_exactly(&[Tier::InformalKnowledge, Tier::ExternalIntelligence]));

    // One finding per tier that speaks to the topic
    assert_eq!(report.findings().len(), 2);
    assert_eq!(record.finding_ids.len(), 2);
    assert!(report.findings().iter().all(|f| f.severity == Severity::High));
}

// ============================================================================
// Scenario B: codified standards unavailable
// ============================================================================

#[tokio::test]
async fn test_scenario_b_codified_auth_denied() {
    let root = scan_root();
    let engine = engine(
        &[
            MockTier::fail(Tier::CodifiedStandards, TierFailureKind::AuthDenied),
            MockTier::succeed(Tier::InformalKnowledge, vec![consent_statement(Tier::InformalKnowledge)]),
            MockTier::succeed(
                Tier::ExternalIntelligence,
                vec![consent_statement(Tier::ExternalIntelligence)],
            ),
        ],
        Some(ScriptedAgent::emitting(vec![consent_candidate()])),
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert!(report.reconciliation().is_empty());
    let codified = report.ring_availability().entry(Tier::CodifiedStandards);
    assert_eq!(codified.status, AvailabilityStatus::Unavailable);
    assert_eq!(codified.reason, Some(UnavailableReason::AuthDenied));

    // Findings from the consulted tiers are still reported
    assert_eq!(report.findings().len(), 2);
    assert!(report.findings().iter().all(|f| f.tier != Tier::CodifiedStandards));
}

// ============================================================================
// Scenario C: critical untracked gap
// ============================================================================

#[tokio::test]
async fn test_scenario_c_critical_untracked() {
    let root = scan_root();
    let engine = engine(
        &[
            MockTier::succeed(Tier::CodifiedStandards, vec![ssn_statement(Tier::CodifiedStandards, "AES-256")]),
            MockTier::succeed(Tier::InformalKnowledge, vec![ssn_statement(Tier::InformalKnowledge, "AES-256")]),
            MockTier::succeed(
                Tier::ExternalIntelligence,
                vec![dpia_statement(Tier::ExternalIntelligence)],
            ),
        ],
        None,
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert_eq!(report.reconciliation().len(), 1);
    let record = &report.reconciliation()[0];
    assert_eq!(record.topic, "dpia-for-automated-profiling");
    assert_eq!(record.classification, GapClass::CriticalUntrackedGap);
    assert_eq!(record.priority, Severity::Critical);
    assert_eq!(
        report.summary().by_gap_class.get(GapClass::CriticalUntrackedGap),
        1
    );
}

// ============================================================================
// Scenario D: superseded standard
// ============================================================================

#[tokio::test]
async fn test_scenario_d_superseded_standard() {
    let root = scan_root();
    let engine = engine(
        &[
            MockTier::succeed(Tier::CodifiedStandards, vec![ssn_statement(Tier::CodifiedStandards, "AES-128")]),
            MockTier::succeed(Tier::InformalKnowledge, vec![ssn_statement(Tier::InformalKnowledge, "AES-256")]),
            MockTier::succeed(
                Tier::ExternalIntelligence,
                vec![ssn_statement(Tier::ExternalIntelligence, "AES-256")],
            ),
        ],
        Some(ScriptedAgent::emitting(vec![ssn_candidate()])),
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert_eq!(report.reconciliation().len(), 1);
    let record = &report.reconciliation()[0];
    assert_eq!(record.classification, GapClass::SupersededStandardConflict);
    let conflict = &record.value_conflicts[0];
    assert_eq!(conflict.field, "encryption_algorithm");
    assert_eq!(conflict.baseline, "AES-128");
    assert_eq!(conflict.target, "AES-256");
    assert_eq!(conflict.target_tier, Tier::ExternalIntelligence);

    // Codified finding keeps the category severity of the codified statement
    let codified = report
        .findings()
        .iter()
        .find(|f| f.tier == Tier::CodifiedStandards)
        .unwrap();
    assert_eq!(codified.severity, Severity::Critical);
    assert_eq!(report.findings().len(), 3);
}

// ============================================================================
// Scenario E: every tier times out
// ============================================================================

#[tokio::test]
async fn test_scenario_e_all_tiers_time_out() {
    let root = scan_root();
    let engine = engine(
        &[
            MockTier::hang(Tier::CodifiedStandards),
            MockTier::hang(Tier::InformalKnowledge),
            MockTier::hang(Tier::ExternalIntelligence),
        ],
        Some(ScriptedAgent::emitting(vec![ssn_candidate()])),
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert!(report.findings().is_empty());
    assert!(report.reconciliation().is_empty());
    assert!(report.assembly_error().is_none());
    for entry in report.ring_availability().entries() {
        assert_eq!(entry.status, AvailabilityStatus::Unavailable);
        assert_eq!(entry.reason, Some(UnavailableReason::Timeout));
    }
    assert_eq!(report.summary().unattributed_candidates, 1);
    assert_eq!(report.summary().tiers_consulted, 0);
}

#[tokio::test]
async fn test_no_tiers_configured_still_reports() {
    let root = scan_root();
    let engine = ScanEngine::new(
        TierSlots::from_clients(Vec::<Arc<dyn TierClient>>::new()),
        None::<Arc<dyn ReasoningAgent>>,
        ApprovalPolicy::ReadOnly,
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    assert!(report.findings().is_empty());
    for entry in report.ring_availability().entries() {
        assert_eq!(entry.reason, Some(UnavailableReason::NotConfigured));
    }
}
