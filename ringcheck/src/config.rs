//! Runtime wiring from configuration
//!
//! Builds the scan engine from the loaded `TomlConfig` after the
//! authentication phase has populated the credential store.

use crate::agent::{AgentError, ApprovalPolicy, CommandAgent, ManifestAgent, ReasoningAgent};
use crate::error::ScanError;
use crate::scan::{EngineSettings, ScanEngine};
use crate::tiers::build_tier_slots;
use ringcheck_common::config::{AgentConfig, AgentKind, TomlConfig};
use ringcheck_common::credentials::CredentialStore;
use std::sync::Arc;
use tracing::info;

/// Build the configured reasoning agent
///
/// # Returns
/// `None` for `kind = "none"`; an error when the section lacks what the
/// chosen kind needs.
pub fn build_agent(config: &AgentConfig) -> Result<Option<Arc<dyn ReasoningAgent>>, ScanError> {
    match config.kind {
        AgentKind::None => Ok(None),
        AgentKind::Manifest => {
            let path = config.candidates.as_ref().ok_or_else(|| {
                AgentError::Manifest("agent.candidates is required for the manifest agent".to_string())
            })?;
            info!(manifest = %path.display(), "Using manifest agent");
            Ok(Some(Arc::new(ManifestAgent::new(path))))
        }
        AgentKind::Command => {
            let agent = CommandAgent::new(config.command.clone())?;
            info!(program = %config.command[0], "Using command agent");
            Ok(Some(Arc::new(agent)))
        }
    }
}

/// Build the scan engine
///
/// # Arguments
/// * `config` - Effective configuration (CLI overrides already applied)
/// * `credentials` - Initialized credential store
pub fn build_engine(
    config: &TomlConfig,
    credentials: Arc<CredentialStore>,
) -> Result<ScanEngine, ScanError> {
    let slots = build_tier_slots(&config.tiers, credentials);
    let agent = build_agent(&config.agent)?;
    let policy = ApprovalPolicy::from_config(config.agent.approval, &config.agent.allow);
    let settings = EngineSettings::from_config(&config.scan);

    Ok(ScanEngine::new(slots, agent, policy, settings))
}
