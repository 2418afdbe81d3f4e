//! Manifest agent
//!
//! Replays the output of an offline agent run. The manifest is either a bare
//! array of candidate violations or a recorded session:
//!
//! ```json
//! {
//!   "toolCalls": [ { "tier": "external_intelligence", "prompt": "GDPR encryption" } ],
//!   "candidates": [ { "topicHint": "...", "file": "...", "lineRange": {...}, "description": "..." } ]
//! }
//! ```
//!
//! Recorded tool calls are re-issued through the toolbox so agent-driven
//! scans consult the same tiers the original run did.

use super::{AgentError, AgentSession, ReasoningAgent};
use crate::types::{CandidateViolation, Tier};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedToolCall {
    tier: Tier,
    prompt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedSession {
    #[serde(default)]
    tool_calls: Vec<RecordedToolCall>,
    #[serde(default)]
    candidates: Vec<CandidateViolation>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Candidates(Vec<CandidateViolation>),
    Session(RecordedSession),
}

pub struct ManifestAgent {
    path: PathBuf,
}

impl ManifestAgent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<RecordedSession, AgentError> {
        let body = tokio::fs::read(&self.path).await?;
        let manifest: Manifest = serde_json::from_slice(&body)
            .map_err(|e| AgentError::Manifest(format!("{}: {}", self.path.display(), e)))?;
        Ok(match manifest {
            Manifest::Candidates(candidates) => RecordedSession {
                tool_calls: Vec::new(),
                candidates,
            },
            Manifest::Session(session) => session,
        })
    }
}

#[async_trait]
impl ReasoningAgent for ManifestAgent {
    fn name(&self) -> &str {
        "manifest"
    }

    async fn run(&self, session: AgentSession) -> Result<(), AgentError> {
        let recorded = self.load().await?;
        info!(
            manifest = %self.path.display(),
            tool_calls = recorded.tool_calls.len(),
            candidates = recorded.candidates.len(),
            "Replaying agent manifest"
        );

        for call in &recorded.tool_calls {
            if session.cancel.is_cancelled() {
                warn!("Scan cancelled while replaying tool calls");
                return Ok(());
            }
            session.tools.query(call.tier, &call.prompt).await;
        }

        for candidate in recorded.candidates {
            if !session.candidates.emit(candidate) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ApprovalPolicy, CandidateSink, TierToolbox, WorkspaceCapability};
    use crate::tiers::TierSlots;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn session(dir: &TempDir, sink: CandidateSink) -> AgentSession {
        AgentSession {
            prompt: "q".to_string(),
            workspace: Arc::new(
                WorkspaceCapability::new(dir.path(), ApprovalPolicy::ReadOnly).unwrap(),
            ),
            tools: Arc::new(TierToolbox::new(
                TierSlots::from_clients(vec![]),
                Duration::from_secs(1),
                CancellationToken::new(),
            )),
            candidates: sink,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_bare_array_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("candidates.json");
        std::fs::write(
            &path,
            r#"[{"topicHint": "ssn-encryption", "file": "src/a.py",
                 "lineRange": {"start": 1, "end": 2}, "description": "plaintext"}]"#,
        )
        .unwrap();

        let (sink, mut stream) = CandidateSink::channel();
        ManifestAgent::new(&path).run(session(&dir, sink)).await.unwrap();

        assert_eq!(stream.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_session_manifest_replays_tool_calls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{"toolCalls": [{"tier": "informal_knowledge", "prompt": "pii"}],
                "candidates": []}"#,
        )
        .unwrap();

        let (sink, _stream) = CandidateSink::channel();
        let session = session(&dir, sink);
        let tools = Arc::clone(&session.tools);
        ManifestAgent::new(&path).run(session).await.unwrap();

        let calls = tools.calls().await;
        // Unconfigured tiers answer directly and are not logged as calls
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_manifest_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"candidates": "nope"}"#).unwrap();

        let (sink, _stream) = CandidateSink::channel();
        let result = ManifestAgent::new(&path).run(session(&dir, sink)).await;
        assert!(matches!(result, Err(AgentError::Manifest(_))));
    }
}
