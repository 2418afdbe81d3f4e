//! # ringcheck common library
//!
//! Shared code for the ringcheck crates:
//! - Error types
//! - TOML configuration model and config file resolution
//! - Credential cache for tier authentication

pub mod config;
pub mod credentials;
pub mod error;

pub use error::{Error, Result};
