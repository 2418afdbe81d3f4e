//! Scan engine
//!
//! Drives one scan end to end:
//! 1. Validate the request (scan root, ring selection)
//! 2. Consult the tiers (eager mode) while the agent runs
//! 3. Collect streamed candidates
//! 4. Normalize → reconcile → assemble
//!
//! A scan-level deadline cancels the root token; tier queries still pending
//! settle as `timeout`, the agent is stopped, and a best-effort report is
//! assembled from whatever arrived.

use crate::agent::{
    AgentSession, ApprovalPolicy, CandidateSink, ReasoningAgent, TierToolbox, WorkspaceCapability,
};
use crate::error::ScanError;
use crate::normalizer;
use crate::orchestrator::{RingOrchestrator, RingOutcome};
use crate::reconciliation;
use crate::report::{self, AssemblyInput, ComplianceReport, ScanMetadata};
use crate::tiers::TierSlots;
use crate::types::{CandidateViolation, Tier, TierSet, TierStatement};
use chrono::Utc;
use ringcheck_common::config::{ScanConfig, ScanMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Scan behaviour shared by every request
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub mode: ScanMode,
    pub tier_timeout: Duration,
    pub deadline: Duration,
    pub prompt: String,
}

impl EngineSettings {
    pub fn from_config(scan: &ScanConfig) -> Self {
        Self {
            mode: scan.mode,
            tier_timeout: Duration::from_secs(scan.tier_timeout_secs),
            deadline: Duration::from_secs(scan.deadline_secs),
            prompt: scan.prompt.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

/// One scan request
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub path: PathBuf,
    pub rings: TierSet,
}

impl ScanRequest {
    /// Request covering all three tiers
    pub fn all(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rings: Tier::ALL.into_iter().collect(),
        }
    }
}

/// Parse a `--ring` value: comma-separated tier names or `all`
pub fn parse_ring_selection(value: &str) -> Result<TierSet, ScanError> {
    let mut selection = TierSet::empty();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.to_ascii_lowercase().as_str() {
            "all" => Tier::ALL.into_iter().for_each(|t| selection.insert(t)),
            "codified" | "codified_standards" | "codified-standards" => {
                selection.insert(Tier::CodifiedStandards)
            }
            "informal" | "informal_knowledge" | "informal-knowledge" => {
                selection.insert(Tier::InformalKnowledge)
            }
            "external" | "external_intelligence" | "external-intelligence" => {
                selection.insert(Tier::ExternalIntelligence)
            }
            _ => return Err(ScanError::UnknownRing(part.to_string())),
        }
    }
    if selection.is_empty() {
        return Err(ScanError::EmptySelection);
    }
    Ok(selection)
}

fn mode_label(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Eager => "eager",
        ScanMode::Agent => "agent",
    }
}

/// Ring orchestration and reconciliation engine
pub struct ScanEngine {
    slots: TierSlots,
    agent: Option<Arc<dyn ReasoningAgent>>,
    policy: ApprovalPolicy,
    settings: EngineSettings,
}

impl ScanEngine {
    /// # Arguments
    /// * `slots` - Tier clients (unselected tiers are excluded per request)
    /// * `agent` - Reasoning agent, `None` for reconciliation-only scans
    /// * `policy` - Approval policy for the agent's capability
    /// * `settings` - Mode, timeouts, prompt
    pub fn new(
        slots: TierSlots,
        agent: Option<Arc<dyn ReasoningAgent>>,
        policy: ApprovalPolicy,
        settings: EngineSettings,
    ) -> Self {
        Self {
            slots,
            agent,
            policy,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run a scan
    ///
    /// # Errors
    /// Only for requests rejected before orchestration (invalid path, empty
    /// selection). Everything after that point yields a report.
    pub async fn scan(&self, request: ScanRequest) -> Result<ComplianceReport, ScanError> {
        if !request.path.is_dir() {
            return Err(ScanError::InvalidScanPath(request.path));
        }
        if request.rings.is_empty() {
            return Err(ScanError::EmptySelection);
        }

        let workspace = Arc::new(WorkspaceCapability::new(&request.path, self.policy.clone())?);
        let scan_id = Uuid::new_v4();
        let timestamp = Utc::now();
        let start = Instant::now();
        let mode = self.settings.mode;

        info!(
            scan_id = %scan_id,
            path = %workspace.root().display(),
            mode = mode_label(mode),
            rings = ?request.rings.iter().map(Tier::key).collect::<Vec<_>>(),
            "Starting scan"
        );

        let slots = self.slots.clone().restrict(request.rings);
        let cancel = CancellationToken::new();
        let deadline = spawn_deadline(self.settings.deadline, cancel.clone());

        let tools = Arc::new(TierToolbox::new(
            slots.clone(),
            self.settings.tier_timeout,
            cancel.clone(),
        ));
        let (sink, mut stream) = CandidateSink::channel();
        let session = AgentSession {
            prompt: self.settings.prompt.clone(),
            workspace: Arc::clone(&workspace),
            tools: Arc::clone(&tools),
            candidates: sink,
            cancel: cancel.clone(),
        };

        let outcome = match mode {
            ScanMode::Eager => {
                let orchestrator = RingOrchestrator::new(slots, self.settings.tier_timeout);
                let (mut outcome, ()) = tokio::join!(
                    orchestrator.consult(&self.settings.prompt, &cancel),
                    self.run_agent(session, &cancel)
                );
                merge_tool_statements(&mut outcome, &tools).await;
                outcome
            }
            ScanMode::Agent => {
                self.run_agent(session, &cancel).await;
                RingOutcome::from_settlements(tools.settlements().await)
            }
        };
        deadline.abort();

        let candidates: Vec<CandidateViolation> = stream.drain();
        let tool_calls = tools.calls().await;
        debug!(tool_calls = tool_calls.len(), candidates = candidates.len(), "Agent output collected");

        let statements: Vec<TierStatement> = outcome.all_statements().cloned().collect();
        let normalized = normalizer::normalize(&statements, &candidates);
        let records =
            reconciliation::reconcile(&normalized.topics, &normalized.findings, &outcome.ledger);

        let report = report::assemble(AssemblyInput {
            metadata: ScanMetadata {
                scan_id,
                scan_path: workspace.root().display().to_string(),
                timestamp,
                mode: mode_label(mode).to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
            ledger: outcome.ledger,
            topics: &normalized.topics,
            findings: normalized.findings,
            records,
            unattributed: normalized.unattributed.len(),
        });

        info!(
            scan_id = %scan_id,
            duration_ms = report.duration_ms(),
            findings = report.summary().total_findings,
            "Scan complete"
        );
        Ok(report)
    }

    /// Run the agent until it finishes or the scan is cancelled
    async fn run_agent(&self, session: AgentSession, cancel: &CancellationToken) {
        let Some(agent) = &self.agent else {
            debug!("No reasoning agent configured");
            return;
        };

        info!(agent = agent.name(), "Starting reasoning agent");
        tokio::select! {
            result = agent.run(session) => match result {
                Ok(()) => info!(agent = agent.name(), "Reasoning agent finished"),
                Err(e) => error!(agent = agent.name(), error = %e, "Reasoning agent failed, keeping partial output"),
            },
            _ = cancel.cancelled() => {
                warn!(agent = agent.name(), "Scan deadline reached, stopping reasoning agent");
            }
        }
    }
}

/// Cancel `token` once `deadline` elapses
fn spawn_deadline(deadline: Duration, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        warn!(deadline_secs = deadline.as_secs(), "Scan deadline reached");
        token.cancel();
    })
}

/// Add statements the agent fetched through tools from tiers the
/// orchestrator consulted, refreshing their ledger counts. Tool results from
/// unavailable tiers are dropped.
async fn merge_tool_statements(outcome: &mut RingOutcome, tools: &TierToolbox) {
    for tier in Tier::ALL {
        let fetched = tools.statements(tier).await;
        if fetched.is_empty() {
            continue;
        }
        if !outcome.ledger.entry(tier).is_consulted() {
            debug!(tier = %tier, dropped = fetched.len(), "Ignoring tool statements from unavailable tier");
            continue;
        }
        let known = outcome.statements.get_mut(tier);
        for statement in fetched {
            if !known.contains(&statement) {
                known.push(statement);
            }
        }
        let count = known.len();
        outcome.ledger.record_statement_count(tier, count);
    }
}
