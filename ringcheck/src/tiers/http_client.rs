//! HTTP tier backend
//!
//! POSTs `{"query": <prompt>}` to the configured endpoint with a bearer token
//! taken from the credential store, and maps the response onto `TierResult`.
//!
//! | Outcome                        | Result                 |
//! |--------------------------------|------------------------|
//! | 2xx + valid payload            | `Success`              |
//! | 401 / 403                      | `AuthDenied`           |
//! | 408 or request timeout         | `Timeout`              |
//! | 429, 5xx, other, connect error | `ServiceUnavailable`   |
//! | 2xx + invalid payload          | `MalformedResponse`    |
//! | no token in credential store   | `NotConfigured`        |

use super::{parse_payload, TierClient, TierFailureKind, TierResult};
use crate::types::Tier;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use ringcheck_common::credentials::CredentialStore;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// HTTP tier client
pub struct HttpTierClient {
    tier: Tier,
    client: Client,
    endpoint: String,
    credentials: Arc<CredentialStore>,
    /// Optional per-backend request rate limit
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl HttpTierClient {
    /// Create a client for one tier
    ///
    /// # Arguments
    /// * `tier` - Tier this backend answers for
    /// * `endpoint` - Query URL
    /// * `credentials` - Initialized credential store
    /// * `requests_per_second` - Rate limit (`None` or 0 = unlimited)
    pub fn new(
        tier: Tier,
        endpoint: impl Into<String>,
        credentials: Arc<CredentialStore>,
        requests_per_second: Option<u32>,
    ) -> ringcheck_common::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ringcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ringcheck_common::Error::Config(format!("Failed to build HTTP client: {}", e))
            })?;

        let rate_limiter = requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Ok(Self {
            tier,
            client,
            endpoint: endpoint.into(),
            credentials,
            rate_limiter,
        })
    }
}

#[async_trait]
impl TierClient for HttpTierClient {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn backend(&self) -> &'static str {
        "http"
    }

    async fn query(&self, prompt: &str, timeout: Duration) -> TierResult {
        let Some(token) = self.credentials.token(self.tier.key()) else {
            return TierResult::failure(
                TierFailureKind::NotConfigured,
                "no token available for tier",
            );
        };

        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(tier = %self.tier, endpoint = %self.endpoint, "Querying tier over HTTP");

        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(token.expose())
            .timeout(timeout)
            .json(&QueryBody { query: prompt })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        if !status.is_success() {
            return status_failure(status);
        }

        match response.bytes().await {
            Ok(body) => parse_payload(self.tier, &body),
            Err(e) => transport_failure(e),
        }
    }
}

fn status_failure(status: StatusCode) -> TierResult {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TierFailureKind::AuthDenied,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TierFailureKind::Timeout,
        _ => TierFailureKind::ServiceUnavailable,
    };
    TierResult::failure(kind, format!("backend returned HTTP {}", status))
}

fn transport_failure(error: reqwest::Error) -> TierResult {
    if error.is_timeout() {
        TierResult::failure(TierFailureKind::Timeout, error.to_string())
    } else if error.is_decode() {
        TierResult::failure(TierFailureKind::MalformedResponse, error.to_string())
    } else {
        TierResult::failure(TierFailureKind::ServiceUnavailable, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_status_mapping() {
        let kind = |status| match status_failure(status) {
            TierResult::Failure { kind, .. } => kind,
            TierResult::Success { .. } => panic!("expected failure"),
        };
        assert_eq!(kind(StatusCode::UNAUTHORIZED), TierFailureKind::AuthDenied);
        assert_eq!(kind(StatusCode::FORBIDDEN), TierFailureKind::AuthDenied);
        assert_eq!(kind(StatusCode::GATEWAY_TIMEOUT), TierFailureKind::Timeout);
        assert_eq!(kind(StatusCode::TOO_MANY_REQUESTS), TierFailureKind::ServiceUnavailable);
        assert_eq!(kind(StatusCode::BAD_GATEWAY), TierFailureKind::ServiceUnavailable);
        assert_eq!(kind(StatusCode::NOT_FOUND), TierFailureKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_missing_token_is_not_configured() {
        let store = Arc::new(CredentialStore::new());
        store.initialize(HashMap::new()).unwrap();
        let client =
            HttpTierClient::new(Tier::CodifiedStandards, "http://127.0.0.1:9/q", store, None)
                .unwrap();

        let result = client.query("anything", Duration::from_secs(1)).await;
        assert!(matches!(
            result,
            TierResult::Failure { kind: TierFailureKind::NotConfigured, .. }
        ));
    }
}
