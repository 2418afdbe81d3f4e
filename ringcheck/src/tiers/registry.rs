//! Tier client registry
//!
//! Turns the `[tiers.*]` configuration into one slot per tier. A tier whose
//! section is missing, disabled, or lacks a required identifier (endpoint,
//! path, token) is not an error: its slot records why it is unconfigured and
//! the scan reports it as `not_configured`.

use super::{FileTierClient, HttpTierClient, TierClient};
use crate::types::{Tier, TierMap, TierSet};
use ringcheck_common::config::{TierBackendKind, TiersConfig};
use ringcheck_common::credentials::{default_token_env, CredentialStore};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-tier client state for a scan
#[derive(Clone)]
pub enum TierSlot {
    /// Client ready to be queried
    Ready(Arc<dyn TierClient>),
    /// Required identifiers missing; carries the reason
    Unconfigured(String),
    /// Left out of the ring selection
    Excluded,
}

impl fmt::Debug for TierSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierSlot::Ready(client) => write!(f, "Ready({})", client.backend()),
            TierSlot::Unconfigured(reason) => write!(f, "Unconfigured({})", reason),
            TierSlot::Excluded => f.write_str("Excluded"),
        }
    }
}

/// Slots for all three tiers
#[derive(Debug, Clone)]
pub struct TierSlots(TierMap<TierSlot>);

impl TierSlots {
    /// Slots from already-built clients; tiers without a client are unconfigured
    pub fn from_clients(clients: Vec<Arc<dyn TierClient>>) -> Self {
        let mut slots = TierMap::from_fn(|_| TierSlot::Unconfigured("no client".to_string()));
        for client in clients {
            let tier = client.tier();
            *slots.get_mut(tier) = TierSlot::Ready(client);
        }
        Self(slots)
    }

    pub fn get(&self, tier: Tier) -> &TierSlot {
        self.0.get(tier)
    }

    /// Exclude every tier outside `selection`
    pub fn restrict(mut self, selection: TierSet) -> Self {
        for tier in Tier::ALL {
            if !selection.contains(tier) {
                *self.0.get_mut(tier) = TierSlot::Excluded;
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, &TierSlot)> {
        self.0.iter()
    }
}

/// Build tier slots from configuration
///
/// # Arguments
/// * `config` - `[tiers.*]` sections
/// * `credentials` - Initialized credential store
pub fn build_tier_slots(config: &TiersConfig, credentials: Arc<CredentialStore>) -> TierSlots {
    let slots = TierMap::from_fn(|tier| {
        let slot = build_slot(tier, config, &credentials);
        match &slot {
            TierSlot::Ready(client) => {
                info!(tier = %tier, backend = client.backend(), "Tier backend configured")
            }
            TierSlot::Unconfigured(reason) => {
                info!(tier = %tier, reason = %reason, "Tier backend not configured")
            }
            TierSlot::Excluded => {}
        }
        slot
    });
    TierSlots(slots)
}

fn build_slot(tier: Tier, config: &TiersConfig, credentials: &Arc<CredentialStore>) -> TierSlot {
    let Some(section) = config.get(tier.key()) else {
        return TierSlot::Unconfigured("no backend section".to_string());
    };
    if !section.enabled {
        return TierSlot::Unconfigured("disabled in configuration".to_string());
    }

    match section.kind {
        TierBackendKind::Http => {
            let Some(endpoint) = section.endpoint.as_deref().filter(|e| !e.trim().is_empty())
            else {
                return TierSlot::Unconfigured("missing endpoint".to_string());
            };
            if credentials.token(tier.key()).is_none() {
                let env_name = section
                    .token_env
                    .clone()
                    .unwrap_or_else(|| default_token_env(tier.key()));
                return TierSlot::Unconfigured(format!(
                    "missing token (set {} or tiers.{}.token)",
                    env_name,
                    tier.key()
                ));
            }
            match HttpTierClient::new(
                tier,
                endpoint,
                Arc::clone(credentials),
                section.requests_per_second,
            ) {
                Ok(client) => TierSlot::Ready(Arc::new(client)),
                Err(e) => {
                    warn!(tier = %tier, error = %e, "Failed to build HTTP tier client");
                    TierSlot::Unconfigured(e.to_string())
                }
            }
        }
        TierBackendKind::File => match &section.path {
            Some(path) => TierSlot::Ready(Arc::new(FileTierClient::new(tier, path))),
            None => TierSlot::Unconfigured("missing path".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringcheck_common::config::TomlConfig;

    fn slots_for(toml: &str, env: impl Fn(&str) -> Option<String>) -> TierSlots {
        let config = TomlConfig::from_toml_str(toml).unwrap();
        let store = Arc::new(CredentialStore::new());
        store.initialize_from_config(&config.tiers, env).unwrap();
        build_tier_slots(&config.tiers, store)
    }

    #[test]
    fn test_missing_identifiers_are_unconfigured() {
        let slots = slots_for(
            r#"
            [tiers.codified_standards]
            kind = "http"
            endpoint = "https://ontology/query"

            [tiers.informal_knowledge]
            kind = "file"

            [tiers.external_intelligence]
            kind = "http"
            "#,
            |_| None,
        );

        match slots.get(Tier::CodifiedStandards) {
            TierSlot::Unconfigured(reason) => {
                assert!(reason.contains("RINGCHECK_CODIFIED_STANDARDS_TOKEN"))
            }
            other => panic!("unexpected slot {:?}", other),
        }
        assert!(matches!(slots.get(Tier::InformalKnowledge), TierSlot::Unconfigured(r) if r == "missing path"));
        assert!(matches!(slots.get(Tier::ExternalIntelligence), TierSlot::Unconfigured(r) if r == "missing endpoint"));
    }

    #[test]
    fn test_configured_backends_are_ready() {
        let slots = slots_for(
            r#"
            [tiers.codified_standards]
            kind = "http"
            endpoint = "https://ontology/query"

            [tiers.informal_knowledge]
            kind = "file"
            path = "/srv/informal.json"
            enabled = false

            [tiers.external_intelligence]
            kind = "file"
            path = "/srv/external.json"
            "#,
            |name| (name == "RINGCHECK_CODIFIED_STANDARDS_TOKEN").then(|| "t".to_string()),
        );

        assert!(matches!(slots.get(Tier::CodifiedStandards), TierSlot::Ready(c) if c.backend() == "http"));
        assert!(matches!(slots.get(Tier::InformalKnowledge), TierSlot::Unconfigured(_)));
        assert!(matches!(slots.get(Tier::ExternalIntelligence), TierSlot::Ready(c) if c.backend() == "file"));
    }

    #[test]
    fn test_restrict_excludes_unselected() {
        let slots = TierSlots::from_clients(vec![Arc::new(FileTierClient::new(
            Tier::CodifiedStandards,
            "/x.json",
        ))])
        .restrict([Tier::InformalKnowledge].into_iter().collect());

        assert!(matches!(slots.get(Tier::CodifiedStandards), TierSlot::Excluded));
        assert!(matches!(slots.get(Tier::InformalKnowledge), TierSlot::Unconfigured(_)));
        assert!(matches!(slots.get(Tier::ExternalIntelligence), TierSlot::Excluded));
    }
}
