//! Reasoning-agent boundary
//!
//! The agent itself lives outside this crate. The engine hands it an
//! `AgentSession` holding everything it is allowed to touch:
//! - the scan root, through a `WorkspaceCapability` gated by an approval policy
//! - the three tiers, through a `TierToolbox`
//! - a `CandidateSink` on which it streams candidate violations
//!
//! Candidates are collected as they arrive, so whatever was streamed before
//! an agent failure or the scan deadline is kept.
//!
//! # Agents
//! 1. **manifest** - replays a JSON manifest written by an offline agent run
//! 2. **command** - external agent process speaking NDJSON on stdio

pub mod capability;
pub mod command;
pub mod manifest;
pub mod toolbox;

pub use capability::{ApprovalPolicy, CapabilityError, WorkspaceCapability};
pub use command::CommandAgent;
pub use manifest::ManifestAgent;
pub use toolbox::{TierToolbox, ToolCall};

use crate::types::CandidateViolation;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Agent errors (logged by the engine, never fatal to a scan)
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid candidate manifest: {0}")]
    Manifest(String),

    #[error("Agent protocol error: {0}")]
    Protocol(String),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),
}

/// Sending half of the candidate stream
#[derive(Debug, Clone)]
pub struct CandidateSink {
    tx: mpsc::UnboundedSender<CandidateViolation>,
}

impl CandidateSink {
    /// Create a sink and the stream it feeds
    pub fn channel() -> (Self, CandidateStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CandidateStream { rx })
    }

    /// Emit one candidate; returns false once the scan stopped listening
    pub fn emit(&self, candidate: CandidateViolation) -> bool {
        debug!(
            topic_hint = %candidate.topic_hint,
            file = %candidate.file,
            lines = %candidate.line_range,
            "Candidate violation"
        );
        self.tx.send(candidate).is_ok()
    }
}

/// Receiving half of the candidate stream
#[derive(Debug)]
pub struct CandidateStream {
    rx: mpsc::UnboundedReceiver<CandidateViolation>,
}

impl CandidateStream {
    /// Take every candidate received so far
    pub fn drain(&mut self) -> Vec<CandidateViolation> {
        let mut candidates = Vec::new();
        while let Ok(candidate) = self.rx.try_recv() {
            candidates.push(candidate);
        }
        candidates
    }
}

/// Everything an agent run may use
#[derive(Clone)]
pub struct AgentSession {
    /// Requirements query for this scan
    pub prompt: String,
    pub workspace: Arc<WorkspaceCapability>,
    pub tools: Arc<TierToolbox>,
    pub candidates: CandidateSink,
    /// Scan deadline; agents should stop promptly once cancelled
    pub cancel: CancellationToken,
}

/// A reasoning agent producing candidate violations
#[async_trait]
pub trait ReasoningAgent: Send + Sync {
    /// Agent name for logging
    fn name(&self) -> &str;

    /// Run the agent to completion
    ///
    /// Candidates must be emitted through `session.candidates` as they are
    /// found rather than returned at the end.
    async fn run(&self, session: AgentSession) -> Result<(), AgentError>;
}
