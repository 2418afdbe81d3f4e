//! Command agent
//!
//! Launches the configured agent program with the scan root as working
//! directory and talks newline-delimited JSON over its stdio.
//!
//! Host → agent, once at start:
//! `{"type":"start","root":"...","prompt":"...","tiers":["codified_standards",...]}`
//!
//! Agent → host:
//! - `{"type":"candidate", ...CandidateViolation}` (no reply)
//! - `{"type":"tierQuery","tier":"...","prompt":"..."}` → `{"type":"tierResult","tier":"...","result":{...}}`
//! - `{"type":"readFile","path":"..."}` → `{"type":"fileContent","path":"...","content":"..."}`
//! - `{"type":"listFiles"}` → `{"type":"fileList","files":[...]}`
//! - `{"type":"runCommand","argv":[...]}` → `{"type":"commandOutput","status":0,"stdout":"...","stderr":"..."}`
//! - `{"type":"done"}`
//!
//! Refused or failed requests are answered with `{"type":"error","message":"..."}`.
//! Unparseable lines are answered the same way and otherwise ignored.

use super::{AgentError, AgentSession, ReasoningAgent};
use crate::tiers::TierResult;
use crate::types::{CandidateViolation, Tier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};

/// How long the agent gets to exit after `done` or end of output
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum AgentMessage {
    Candidate(CandidateViolation),
    TierQuery { tier: Tier, prompt: String },
    ReadFile { path: String },
    ListFiles,
    RunCommand { argv: Vec<String> },
    Done,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum HostMessage<'a> {
    Start {
        root: String,
        prompt: &'a str,
        tiers: Vec<Tier>,
    },
    TierResult {
        tier: Tier,
        result: &'a TierResult,
    },
    FileContent {
        path: &'a str,
        content: String,
    },
    FileList {
        files: Vec<String>,
    },
    CommandOutput {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Error {
        message: String,
    },
}

pub struct CommandAgent {
    argv: Vec<String>,
}

impl CommandAgent {
    /// # Arguments
    /// * `argv` - Program followed by its arguments (must not be empty)
    pub fn new(argv: Vec<String>) -> Result<Self, AgentError> {
        if argv.first().map_or(true, |p| p.trim().is_empty()) {
            return Err(AgentError::Protocol("agent command is empty".to_string()));
        }
        Ok(Self { argv })
    }

    async fn handle(
        &self,
        message: AgentMessage,
        session: &AgentSession,
        stdin: &mut ChildStdin,
    ) -> Result<bool, AgentError> {
        match message {
            AgentMessage::Candidate(candidate) => {
                session.candidates.emit(candidate);
            }
            AgentMessage::TierQuery { tier, prompt } => {
                let result = session.tools.query(tier, &prompt).await;
                send(stdin, &HostMessage::TierResult { tier, result: &result }).await?;
            }
            AgentMessage::ReadFile { path } => {
                let reply = match session.workspace.read_file(&path).await {
                    Ok(content) => HostMessage::FileContent { path: &path, content },
                    Err(e) => HostMessage::Error { message: e.to_string() },
                };
                send(stdin, &reply).await?;
            }
            AgentMessage::ListFiles => {
                let reply = match session.workspace.list_files().await {
                    Ok(files) => HostMessage::FileList { files },
                    Err(e) => HostMessage::Error { message: e.to_string() },
                };
                send(stdin, &reply).await?;
            }
            AgentMessage::RunCommand { argv } => {
                let reply = match session.workspace.run_command(&argv).await {
                    Ok(output) => HostMessage::CommandOutput {
                        status: output.status,
                        stdout: output.stdout,
                        stderr: output.stderr,
                    },
                    Err(e) => HostMessage::Error { message: e.to_string() },
                };
                send(stdin, &reply).await?;
            }
            AgentMessage::Done => return Ok(false),
        }
        Ok(true)
    }
}

#[async_trait]
impl ReasoningAgent for CommandAgent {
    fn name(&self) -> &str {
        "command"
    }

    async fn run(&self, session: AgentSession) -> Result<(), AgentError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| AgentError::Protocol("agent command is empty".to_string()))?;

        info!(program = %program, "Starting agent process");
        let mut child = Command::new(program)
            .args(args)
            .current_dir(session.workspace.root())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Protocol("agent stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Protocol("agent stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        send(
            &mut stdin,
            &HostMessage::Start {
                root: session.workspace.root().display().to_string(),
                prompt: &session.prompt,
                tiers: session.tools.callable_tiers(),
            },
        )
        .await?;

        loop {
            let line = tokio::select! {
                _ = session.cancel.cancelled() => {
                    warn!("Scan cancelled, stopping agent process");
                    let _ = child.start_kill();
                    return Ok(());
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                debug!("Agent closed its output");
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let message: AgentMessage = match serde_json::from_str(&line) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, "Ignoring unparseable agent message");
                    send(
                        &mut stdin,
                        &HostMessage::Error {
                            message: format!("unparseable message: {}", e),
                        },
                    )
                    .await?;
                    continue;
                }
            };

            if !self.handle(message, &session, &mut stdin).await? {
                break;
            }
        }

        drop(stdin);
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                info!(status = %status, "Agent process exited");
                Ok(())
            }
            Ok(Err(e)) => Err(AgentError::Io(e)),
            Err(_) => {
                warn!("Agent process did not exit, killing it");
                let _ = child.start_kill();
                Ok(())
            }
        }
    }
}

async fn send(stdin: &mut ChildStdin, message: &HostMessage<'_>) -> Result<(), AgentError> {
    let mut line = serde_json::to_vec(message)
        .map_err(|e| AgentError::Protocol(format!("failed to encode message: {}", e)))?;
    line.push(b'\n');
    stdin.write_all(&line).await?;
    stdin.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandAgent::new(vec![]).is_err());
        assert!(CommandAgent::new(vec![" ".to_string()]).is_err());
        assert!(CommandAgent::new(vec!["agent".to_string()]).is_ok());
    }

    #[test]
    fn test_parses_agent_messages() {
        let query: AgentMessage = serde_json::from_str(
            r#"{"type":"tierQuery","tier":"external_intelligence","prompt":"GDPR"}"#,
        )
        .unwrap();
        assert!(matches!(
            query,
            AgentMessage::TierQuery { tier: Tier::ExternalIntelligence, .. }
        ));

        let candidate: AgentMessage = serde_json::from_str(
            r#"{"type":"candidate","topicHint":"pii-logging","file":"a.py",
                "lineRange":{"start":4,"end":4},"description":"logs email"}"#,
        )
        .unwrap();
        assert!(matches!(candidate, AgentMessage::Candidate(c) if c.topic_hint == "pii-logging"));

        let done: AgentMessage = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert!(matches!(done, AgentMessage::Done));
    }

    #[test]
    fn test_host_message_shape() {
        let result = TierResult::Success { statements: vec![] };
        let json = serde_json::to_value(HostMessage::TierResult {
            tier: Tier::CodifiedStandards,
            result: &result,
        })
        .unwrap();
        assert_eq!(json["type"], "tierResult");
        assert_eq!(json["tier"], "codified_standards");
        assert_eq!(json["result"]["status"], "success");
    }
}
