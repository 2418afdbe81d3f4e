//! Configuration loading and config file resolution
//!
//! The TOML file is bootstrap-only: it is read once before a scan starts and
//! never re-read. Every field has a built-in default so a missing file is not
//! an error; a malformed file is.
//!
//! # Config file resolution
//!
//! 1. Command-line argument (highest priority)
//! 2. `RINGCHECK_CONFIG` environment variable
//! 3. `./ringcheck.toml` in the working directory
//! 4. `<config_dir>/ringcheck/ringcheck.toml` (fallback)

use crate::credentials::Secret;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "RINGCHECK_CONFIG";

/// Config file name searched in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "ringcheck.toml";

/// Default per-tier query timeout
pub const DEFAULT_TIER_TIMEOUT_SECS: u64 = 30;

/// Default scan-level deadline
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Default requirements query sent to every tier
pub const DEFAULT_PROMPT: &str =
    "List the data-protection, security and compliance requirements that apply to this codebase";

/// Complete TOML configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub scan: ScanConfig,
    pub tiers: TiersConfig,
    pub agent: AgentConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// How tier queries are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Orchestrator queries every selected tier up front
    #[default]
    Eager,
    /// Tiers are queried only when the reasoning agent calls them as tools
    Agent,
}

/// Scan behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Per-tier query timeout in seconds
    pub tier_timeout_secs: u64,
    /// Whole-scan deadline in seconds
    pub deadline_secs: u64,
    /// Requirements query sent to every tier in eager mode
    pub prompt: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Eager,
            tier_timeout_secs: DEFAULT_TIER_TIMEOUT_SECS,
            deadline_secs: DEFAULT_DEADLINE_SECS,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Backend sections keyed by tier
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    pub codified_standards: Option<TierBackendConfig>,
    pub informal_knowledge: Option<TierBackendConfig>,
    pub external_intelligence: Option<TierBackendConfig>,
}

impl TiersConfig {
    /// Look up a backend section by its tier key (`codified_standards`, ...)
    pub fn get(&self, tier_key: &str) -> Option<&TierBackendConfig> {
        match tier_key {
            "codified_standards" => self.codified_standards.as_ref(),
            "informal_knowledge" => self.informal_knowledge.as_ref(),
            "external_intelligence" => self.external_intelligence.as_ref(),
            _ => None,
        }
    }

    fn sections_mut(&mut self) -> impl Iterator<Item = &mut TierBackendConfig> {
        [
            self.codified_standards.as_mut(),
            self.informal_knowledge.as_mut(),
            self.external_intelligence.as_mut(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Transport used to reach a tier backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBackendKind {
    /// JSON over HTTP
    Http,
    /// Exported knowledge snapshot on disk
    File,
}

/// One tier backend section
#[derive(Debug, Clone, Deserialize)]
pub struct TierBackendConfig {
    pub kind: TierBackendKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// HTTP endpoint (required for `http`)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Snapshot path (required for `file`)
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Environment variable holding the bearer token
    #[serde(default)]
    pub token_env: Option<String>,
    /// Inline token (environment variable takes precedence)
    #[serde(default)]
    pub token: Option<Secret>,
    /// Request rate limit for this backend
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

/// Which reasoning agent produces candidate violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// No agent: reconciliation only, zero findings
    #[default]
    None,
    /// Candidate manifest written by an offline agent run
    Manifest,
    /// External agent process speaking the stdio protocol
    Command,
}

/// Approval policy for the agent's file/command capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalSetting {
    /// File reads inside the scan root only
    #[default]
    ReadOnly,
    /// File reads plus the programs named in `allow`
    AllowList,
    /// Anything
    Full,
}

/// Reasoning-agent section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Candidate manifest (manifest agent)
    pub candidates: Option<PathBuf>,
    /// Program and arguments (command agent)
    pub command: Vec<String>,
    pub approval: ApprovalSetting,
    /// Programs permitted under `allow_list`
    pub allow: Vec<String>,
}

impl TomlConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, resolving relative paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scan.tier_timeout_secs == 0 {
            return Err(Error::Config(
                "scan.tier_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.scan.deadline_secs == 0 {
            return Err(Error::Config(
                "scan.deadline_secs must be greater than zero".to_string(),
            ));
        }
        if self.scan.prompt.trim().is_empty() {
            return Err(Error::Config("scan.prompt must not be empty".to_string()));
        }
        Ok(())
    }

    /// Rebase relative snapshot and manifest paths onto `base`
    pub fn resolve_relative_paths(&mut self, base: &Path) {
        for section in self.tiers.sections_mut() {
            if let Some(path) = section.path.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        if let Some(candidates) = self.agent.candidates.as_mut() {
            if candidates.is_relative() {
                *candidates = base.join(&*candidates);
            }
        }
    }
}

/// Locate the config file following the resolution order in the module docs
///
/// Returns `None` when no file exists anywhere; callers fall back to defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|d| d.join("ringcheck").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Load the effective configuration
///
/// An explicitly named file (CLI or environment) must exist and parse. When no
/// file is found the built-in defaults are used and the returned path is
/// `None`. Nothing is logged here: this runs before tracing is initialized.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let explicit = cli_arg.is_some()
        || std::env::var(CONFIG_ENV_VAR)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);

    match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = TomlConfig::load(&path)?;
            Ok((config, Some(path)))
        }
        Some(path) if explicit => Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        _ => Ok((TomlConfig::default(), None)),
    }
}
