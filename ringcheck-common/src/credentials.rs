//! Process-scoped credential cache for tier authentication
//!
//! Tokens are resolved once during the authentication phase, before any scan
//! starts, and are read-only afterwards. The store is handed to tier clients
//! explicitly (`Arc<CredentialStore>`); there is no global instance.
//!
//! Resolution per tier: environment variable → inline TOML `token`.

use crate::config::TiersConfig;
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Secret string that never prints its value
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw value (only at the point of use)
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_usable(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Init-once, read-many token cache keyed by tier key
#[derive(Debug, Default)]
pub struct CredentialStore {
    tokens: OnceCell<HashMap<String, Secret>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the store. Only the first call succeeds.
    pub fn initialize(&self, tokens: HashMap<String, Secret>) -> Result<()> {
        let count = tokens.len();
        self.tokens
            .set(tokens)
            .map_err(|_| Error::Internal("credential store already initialized".to_string()))?;
        info!(tiers_with_tokens = count, "Credential store initialized");
        Ok(())
    }

    /// Resolve tokens for every configured tier and populate the store
    ///
    /// `env` is injected so resolution can be exercised without touching the
    /// process environment.
    pub fn initialize_from_config<F>(&self, tiers: &TiersConfig, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tokens = HashMap::new();

        for key in ["codified_standards", "informal_knowledge", "external_intelligence"] {
            let Some(section) = tiers.get(key) else {
                continue;
            };

            let env_name = section
                .token_env
                .clone()
                .unwrap_or_else(|| default_token_env(key));
            let env_token = env(&env_name).map(Secret::new).filter(Secret::is_usable);
            let toml_token = section.token.clone().filter(Secret::is_usable);

            if env_token.is_some() && toml_token.is_some() {
                warn!(
                    tier = key,
                    env_var = %env_name,
                    "Token found in both environment and TOML; using environment"
                );
            }

            if let Some(token) = env_token.or(toml_token) {
                tokens.insert(key.to_string(), token);
            }
        }

        self.initialize(tokens)
    }

    /// Whether the authentication phase has run
    pub fn is_initialized(&self) -> bool {
        self.tokens.get().is_some()
    }

    /// Token for a tier, if one was resolved
    pub fn token(&self, tier_key: &str) -> Option<&Secret> {
        self.tokens.get().and_then(|t| t.get(tier_key))
    }
}

/// Default environment variable for a tier token, e.g. `RINGCHECK_CODIFIED_STANDARDS_TOKEN`
pub fn default_token_env(tier_key: &str) -> String {
    format!("RINGCHECK_{}_TOKEN", tier_key.to_ascii_uppercase())
}
