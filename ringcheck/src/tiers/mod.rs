//! Tier clients
//!
//! Each knowledge tier is reached through a `TierClient`. Clients never raise:
//! every outcome, including transport and parse failures, comes back as a
//! `TierResult` so one tier can never abort the others.
//!
//! # Backends
//! 1. **http** - JSON over HTTP with bearer auth and rate limiting
//! 2. **file** - exported knowledge snapshot on disk
//!
//! # Wire format
//! Both backends return the same payload:
//! ```json
//! { "statements": [ { "requirementId": "...", "text": "...", "fields": {...} } ] }
//! ```
//! The tier is implied by the client that produced the payload.

pub mod file_client;
pub mod http_client;
pub mod registry;

pub use file_client::FileTierClient;
pub use http_client::HttpTierClient;
pub use registry::{build_tier_slots, TierSlot, TierSlots};

use crate::types::{Citation, Severity, Tier, TierStatement, UnavailableReason};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Failure kinds a tier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierFailureKind {
    AuthDenied,
    ServiceUnavailable,
    NotConfigured,
    Timeout,
    MalformedResponse,
}

impl TierFailureKind {
    pub fn as_reason(self) -> UnavailableReason {
        match self {
            TierFailureKind::AuthDenied => UnavailableReason::AuthDenied,
            TierFailureKind::ServiceUnavailable => UnavailableReason::ServiceUnavailable,
            TierFailureKind::NotConfigured => UnavailableReason::NotConfigured,
            TierFailureKind::Timeout => UnavailableReason::Timeout,
            TierFailureKind::MalformedResponse => UnavailableReason::MalformedResponse,
        }
    }
}

impl fmt::Display for TierFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_reason().fmt(f)
    }
}

/// Outcome of one tier query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TierResult {
    Success {
        statements: Vec<TierStatement>,
    },
    Failure {
        kind: TierFailureKind,
        detail: String,
    },
}

impl TierResult {
    pub fn failure(kind: TierFailureKind, detail: impl Into<String>) -> Self {
        TierResult::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TierResult::Success { .. })
    }
}

/// A knowledge tier backend
///
/// Implementations must be safe to call concurrently and must map every
/// error into `TierResult::Failure`.
#[async_trait]
pub trait TierClient: Send + Sync {
    /// Tier this client answers for
    fn tier(&self) -> Tier;

    /// Backend name for logging (`http`, `file`, ...)
    fn backend(&self) -> &'static str;

    /// Query the tier for statements relevant to `prompt`
    ///
    /// # Arguments
    /// * `prompt` - Requirements query
    /// * `timeout` - Upper bound the backend should apply to its own I/O
    async fn query(&self, prompt: &str, timeout: Duration) -> TierResult;
}

// ============================================================================
// Wire payload
// ============================================================================

/// Statement as returned by a backend (tier implied)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatement {
    #[serde(default)]
    pub requirement_id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub citation: Option<Citation>,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub severity_hint: Option<Severity>,
}

/// Backend response body
#[derive(Debug, Clone, Deserialize)]
pub struct StatementPayload {
    pub statements: Vec<WireStatement>,
}

/// Parse a backend response body into statements for `tier`
///
/// Any structural problem (invalid JSON, missing fields, blank text) makes the
/// whole response malformed; partial payloads are not accepted.
pub fn parse_payload(tier: Tier, body: &[u8]) -> TierResult {
    let payload: StatementPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            return TierResult::failure(
                TierFailureKind::MalformedResponse,
                format!("invalid statement payload: {}", e),
            )
        }
    };

    let mut statements = Vec::with_capacity(payload.statements.len());
    for (index, wire) in payload.statements.into_iter().enumerate() {
        if wire.text.trim().is_empty() {
            return TierResult::failure(
                TierFailureKind::MalformedResponse,
                format!("statement {} has empty text", index),
            );
        }
        statements.push(wire.into_statement(tier));
    }

    TierResult::Success { statements }
}

impl WireStatement {
    pub fn into_statement(self, tier: Tier) -> TierStatement {
        let fields = self
            .fields
            .into_iter()
            .filter_map(|(key, value)| field_value(value).map(|v| (key, v)))
            .collect();

        TierStatement {
            tier,
            requirement_id: self.requirement_id.filter(|id| !id.trim().is_empty()),
            text: self.text.trim().to_string(),
            fields,
            citation: self.citation,
            observed_at: self.observed_at,
            category: self.category,
            severity_hint: self.severity_hint,
        }
    }
}

/// Structured fields are compared as text; nested values are dropped
fn field_value(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payload_assigns_tier() {
        let body = br#"{
            "statements": [
                {
                    "requirementId": "GDPR-32",
                    "text": "  Encrypt personal data at rest  ",
                    "fields": {"encryption_algorithm": "AES-256", "retention_days": 30, "nested": {"x": 1}},
                    "citation": {"source": "GDPR", "locator": "Art. 32"},
                    "category": "data_protection",
                    "severityHint": "high"
                }
            ]
        }"#;

        let TierResult::Success { statements } = parse_payload(Tier::ExternalIntelligence, body)
        else {
            panic!("expected success");
        };

        assert_eq!(statements.len(), 1);
        let s = &statements[0];
        assert_eq!(s.tier, Tier::ExternalIntelligence);
        assert_eq!(s.text, "Encrypt personal data at rest");
        assert_eq!(s.fields.get("retention_days").map(String::as_str), Some("30"));
        assert!(!s.fields.contains_key("nested"));
        assert_eq!(s.severity_hint, Some(Severity::High));
    }

    #[test]
    fn test_parse_payload_rejects_bad_json() {
        let result = parse_payload(Tier::CodifiedStandards, b"<html>oops</html>");
        assert!(matches!(
            result,
            TierResult::Failure { kind: TierFailureKind::MalformedResponse, .. }
        ));
    }

    #[test]
    fn test_parse_payload_rejects_blank_text() {
        let result = parse_payload(
            Tier::CodifiedStandards,
            br#"{"statements": [{"text": "ok"}, {"text": "   "}]}"#,
        );
        assert!(matches!(
            result,
            TierResult::Failure { kind: TierFailureKind::MalformedResponse, .. }
        ));
    }

    #[test]
    fn test_tier_result_wire_shape() {
        let json = serde_json::to_value(TierResult::failure(TierFailureKind::Timeout, "slow")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["detail"], "slow");
    }
}
