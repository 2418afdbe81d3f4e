//! Reasoning agent integration tests
//!
//! Manifest replay through the configured engine, and an external command
//! agent speaking the stdio protocol.

mod helpers;

use helpers::*;
use ringcheck::agent::{ApprovalPolicy, CommandAgent, ReasoningAgent};
use ringcheck::config::build_engine;
use ringcheck::scan::{ScanEngine, ScanRequest};
use ringcheck::types::{Tier, UnavailableReason};
use ringcheck_common::config::{AgentKind, ScanMode, TierBackendConfig, TierBackendKind, TomlConfig};
use ringcheck_common::credentials::CredentialStore;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn file_tier(path: std::path::PathBuf) -> Option<TierBackendConfig> {
    Some(TierBackendConfig {
        kind: TierBackendKind::File,
        enabled: true,
        endpoint: None,
        path: Some(path),
        token_env: None,
        token: None,
        requests_per_second: None,
    })
}

#[tokio::test]
async fn test_manifest_replay_in_agent_mode() {
    let dir = TempDir::new().unwrap();
    let root = scan_root();
    let snapshot = |algorithm: &str| {
        format!(
            r#"{{"statements":[{{"requirementId":"ssn-encryption","text":"Encrypt social security numbers at rest","category":"pii-at-rest-encryption","fields":{{"encryption_algorithm":"{}"}}}}]}}"#,
            algorithm
        )
    };
    std::fs::write(dir.path().join("codified.json"), snapshot("AES-128")).unwrap();
    std::fs::write(dir.path().join("informal.json"), snapshot("AES-256")).unwrap();
    std::fs::write(dir.path().join("external.json"), snapshot("AES-256")).unwrap();
    std::fs::write(
        dir.path().join("manifest.json"),
        r#"{
            "toolCalls": [
                { "tier": "codified_standards", "prompt": "ssn encryption" },
                { "tier": "external_intelligence", "prompt": "ssn encryption" }
            ],
            "candidates": [
                { "topicHint": "ssn-encryption", "file": "src/user.py",
                  "lineRange": { "start": 2, "end": 3 }, "description": "plaintext SSN" }
            ]
        }"#,
    )
    .unwrap();

    let mut config = TomlConfig::default();
    config.scan.mode = ScanMode::Agent;
    config.tiers.codified_standards = file_tier(dir.path().join("codified.json"));
    config.tiers.informal_knowledge = file_tier(dir.path().join("informal.json"));
    config.tiers.external_intelligence = file_tier(dir.path().join("external.json"));
    config.agent.kind = AgentKind::Manifest;
    config.agent.candidates = Some(dir.path().join("manifest.json"));

    let store = Arc::new(CredentialStore::new());
    store.initialize(HashMap::new()).unwrap();
    let report = build_engine(&config, store)
        .unwrap()
        .scan(ScanRequest::all(root.path()))
        .await
        .unwrap();

    let ledger = report.ring_availability();
    assert!(ledger.entry(Tier::CodifiedStandards).is_consulted());
    assert!(ledger.entry(Tier::ExternalIntelligence).is_consulted());
    assert_eq!(
        ledger.entry(Tier::InformalKnowledge).reason,
        Some(UnavailableReason::NotRequested)
    );

    assert_eq!(report.findings().len(), 2);
    let record = &report.reconciliation()[0];
    assert_eq!(record.value_conflicts[0].baseline, "AES-128");
    assert_eq!(record.value_conflicts[0].target, "AES-256");
}

#[tokio::test]
async fn test_unreadable_manifest_still_reports() {
    let root = scan_root();
    let mut config = TomlConfig::default();
    config.agent.kind = AgentKind::Manifest;
    config.agent.candidates = Some(root.path().join("missing.json"));

    let store = Arc::new(CredentialStore::new());
    store.initialize(HashMap::new()).unwrap();
    let report = build_engine(&config, store)
        .unwrap()
        .scan(ScanRequest::all(root.path()))
        .await
        .unwrap();

    assert!(report.findings().is_empty());
    assert!(report.assembly_error().is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_agent_protocol() {
    let root = scan_root();
    let script_dir = TempDir::new().unwrap();
    let script = script_dir.path().join("agent.sh");
    std::fs::write(
        &script,
        r#"#!/bin/sh
read start
case "$start" in *'"type":"start"'*) ;; *) exit 1;; esac
echo '{"type":"tierQuery","tier":"codified_standards","prompt":"ssn encryption"}'
read result
case "$result" in *'"status":"success"'*) ;; *) exit 1;; esac
echo '{"type":"readFile","path":"src/user.py"}'
read content
case "$content" in *'db.write'*) ;; *) exit 1;; esac
echo '{"type":"runCommand","argv":["rm","-rf","src"]}'
read denied
case "$denied" in *'"type":"error"'*) ;; *) exit 1;; esac
echo 'not json'
read ignored
echo '{"type":"candidate","topicHint":"ssn-encryption","file":"src/user.py","lineRange":{"start":2,"end":3},"description":"plaintext SSN"}'
echo '{"type":"done"}'
"#,
    )
    .unwrap();

    let codified = MockTier::succeed(
        Tier::CodifiedStandards,
        vec![ssn_statement(Tier::CodifiedStandards, "AES-256")],
    );
    let agent = CommandAgent::new(vec![
        "sh".to_string(),
        script.to_string_lossy().to_string(),
    ])
    .unwrap();
    let engine = ScanEngine::new(
        slots(&[Arc::clone(&codified)]),
        Some(Arc::new(agent) as Arc<dyn ReasoningAgent>),
        ApprovalPolicy::ReadOnly,
        settings(ScanMode::Eager),
    );

    let report = engine.scan(ScanRequest::all(root.path())).await.unwrap();

    // Every scripted check passed, otherwise the candidate is never sent
    assert_eq!(report.findings().len(), 1);
    assert_eq!(report.findings()[0].tier, Tier::CodifiedStandards);
    // Eager consultation plus the agent's tool call
    assert_eq!(codified.calls(), 2);
    // Read-only policy refused the destructive command
    assert!(root.path().join("src/user.py").exists());
}
