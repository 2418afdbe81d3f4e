//! Common error types for ringcheck

use thiserror::Error;

/// Common result type for ringcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the ringcheck crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (contract breach, not an external failure)
    #[error("Internal error: {0}")]
    Internal(String),
}
