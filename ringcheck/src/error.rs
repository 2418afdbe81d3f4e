//! Error types for ringcheck
//!
//! Only problems detected before orchestration starts are errors. Tier
//! failures end up in the availability ledger, agent failures in the log,
//! and contract breaches in the report's `assemblyError`.

use crate::agent::AgentError;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a completed scan
pub const EXIT_OK: i32 = 0;

/// Exit code for a configuration error before orchestration
pub const EXIT_CONFIG: i32 = 2;

/// Exit code for an internal contract breach caught by the assembler
pub const EXIT_CONTRACT_BREACH: i32 = 3;

/// Pre-orchestration scan error
#[derive(Debug, Error)]
pub enum ScanError {
    /// Scan root missing or not a directory
    #[error("Scan path is not a directory: {0}")]
    InvalidScanPath(PathBuf),

    /// `--ring` named an unknown tier
    #[error("Unknown ring '{0}' (expected codified, informal, external or all)")]
    UnknownRing(String),

    /// `--ring` selected nothing
    #[error("Ring selection is empty")]
    EmptySelection,

    /// Agent section unusable
    #[error("Agent configuration error: {0}")]
    Agent(#[from] AgentError),

    /// ringcheck-common error (config file, credentials)
    #[error("Configuration error: {0}")]
    Config(#[from] ringcheck_common::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScanError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        EXIT_CONFIG
    }
}
