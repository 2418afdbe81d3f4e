//! Test Helper Utilities
//!
//! Shared utilities for testing ringcheck: mock tier clients, a scripted
//! reasoning agent and scan-root fixtures.

#![allow(dead_code)]

use async_trait::async_trait;
use ringcheck::agent::{AgentError, AgentSession, ApprovalPolicy, ReasoningAgent};
use ringcheck::scan::{EngineSettings, ScanEngine};
use ringcheck::tiers::{TierClient, TierFailureKind, TierResult, TierSlots};
use ringcheck::types::{CandidateViolation, LineRange, Tier, TierStatement};
use ringcheck_common::config::ScanMode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Mock tier clients
// ============================================================================

/// What a mock tier does when queried
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed(Vec<TierStatement>),
    /// Statements keyed by prompt; unknown prompts succeed with nothing
    ByPrompt(Vec<(String, Vec<TierStatement>)>),
    Fail(TierFailureKind),
    /// Sleep longer than any test timeout
    Hang,
}

pub struct MockTier {
    tier: Tier,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockTier {
    pub fn new(tier: Tier, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            tier,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn succeed(tier: Tier, statements: Vec<TierStatement>) -> Arc<Self> {
        Self::new(tier, Behavior::Succeed(statements))
    }

    pub fn fail(tier: Tier, kind: TierFailureKind) -> Arc<Self> {
        Self::new(tier, Behavior::Fail(kind))
    }

    pub fn hang(tier: Tier) -> Arc<Self> {
        Self::new(tier, Behavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TierClient for MockTier {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn backend(&self) -> &'static str {
        "mock"
    }

    async fn query(&self, prompt: &str, _timeout: Duration) -> TierResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(statements) => TierResult::Success {
                statements: statements.clone(),
            },
            Behavior::ByPrompt(answers) => TierResult::Success {
                statements: answers
                    .iter()
                    .find(|(p, _)| p == prompt)
                    .map(|(_, statements)| statements.clone())
                    .unwrap_or_default(),
            },
            Behavior::Fail(kind) => TierResult::failure(*kind, "mock failure"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                TierResult::Success {
                    statements: Vec::new(),
                }
            }
        }
    }
}

pub fn slots(clients: &[Arc<MockTier>]) -> TierSlots {
    TierSlots::from_clients(
        clients
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn TierClient>)
            .collect(),
    )
}

// ============================================================================
// Scripted agent
// ============================================================================

/// Agent that makes a fixed list of tool calls, then emits fixed candidates
#[derive(Debug, Clone, Default)]
pub struct ScriptedAgent {
    pub tool_calls: Vec<(Tier, String)>,
    pub candidates: Vec<CandidateViolation>,
    /// Wait for cancellation after emitting instead of returning
    pub linger: bool,
    /// Return an error after emitting
    pub fail: bool,
}

impl ScriptedAgent {
    pub fn emitting(candidates: Vec<CandidateViolation>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    pub fn with_tool_call(mut self, tier: Tier, prompt: &str) -> Self {
        self.tool_calls.push((tier, prompt.to_string()));
        self
    }
}

#[async_trait]
impl ReasoningAgent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, session: AgentSession) -> Result<(), AgentError> {
        for (tier, prompt) in &self.tool_calls {
            session.tools.query(*tier, prompt).await;
        }
        for candidate in &self.candidates {
            session.candidates.emit(candidate.clone());
        }
        if self.fail {
            return Err(AgentError::Protocol("scripted failure".to_string()));
        }
        if self.linger {
            session.cancel.cancelled().await;
        }
        Ok(())
    }
}

// ============================================================================
// Engine and fixtures
// ============================================================================

pub fn settings(mode: ScanMode) -> EngineSettings {
    EngineSettings {
        mode,
        tier_timeout: Duration::from_millis(200),
        deadline: Duration::from_secs(10),
        prompt: "data protection requirements".to_string(),
    }
}

pub fn engine(
    clients: &[Arc<MockTier>],
    agent: Option<ScriptedAgent>,
    settings: EngineSettings,
) -> ScanEngine {
    ScanEngine::new(
        slots(clients),
        agent.map(|a| Arc::new(a) as Arc<dyn ReasoningAgent>),
        ApprovalPolicy::ReadOnly,
        settings,
    )
}

/// Scan root containing a small Python service
pub fn scan_root() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/user.py"),
        "class User:\n    def save(self, ssn):\n        db.write(ssn)\n",
    )
    .unwrap();
    dir
}

pub fn ssn_statement(tier: Tier, algorithm: &str) -> TierStatement {
    TierStatement::new(tier, "Encrypt social security numbers at rest")
        .with_id("ssn-encryption")
        .with_category("pii-at-rest-encryption")
        .with_field("encryption_algorithm", algorithm)
}

pub fn consent_statement(tier: Tier) -> TierStatement {
    TierStatement::new(tier, "Obtain consent before collecting biometric data")
        .with_id("biometric-consent")
        .with_category("consent")
}

pub fn dpia_statement(tier: Tier) -> TierStatement {
    TierStatement::new(tier, "Conduct a DPIA before automated profiling")
        .with_id("DPIA-for-automated-profiling")
        .with_category("impact-assessment")
        .with_citation("GDPR", Some("Art. 35"))
}

pub fn ssn_candidate() -> CandidateViolation {
    CandidateViolation::new(
        "ssn-encryption",
        "src/user.py",
        LineRange::new(2, 3),
        "SSN written to the database in plaintext",
    )
}
