//! File tier backend
//!
//! Serves a tier from an exported knowledge snapshot. The snapshot is re-read
//! on every query so a long-running agent sees the file as it is on disk.

use super::{parse_payload, TierClient, TierFailureKind, TierResult};
use crate::types::Tier;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub struct FileTierClient {
    tier: Tier,
    path: PathBuf,
}

impl FileTierClient {
    pub fn new(tier: Tier, path: impl Into<PathBuf>) -> Self {
        Self {
            tier,
            path: path.into(),
        }
    }
}

#[async_trait]
impl TierClient for FileTierClient {
    fn tier(&self) -> Tier {
        self.tier
    }

    fn backend(&self) -> &'static str {
        "file"
    }

    async fn query(&self, _prompt: &str, timeout: Duration) -> TierResult {
        debug!(tier = %self.tier, path = %self.path.display(), "Reading tier snapshot");

        let read = tokio::time::timeout(timeout, tokio::fs::read(&self.path)).await;
        match read {
            Err(_) => TierResult::failure(TierFailureKind::Timeout, "snapshot read timed out"),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => TierResult::failure(
                TierFailureKind::NotConfigured,
                format!("snapshot not found: {}", self.path.display()),
            ),
            Ok(Err(e)) => TierResult::failure(
                TierFailureKind::ServiceUnavailable,
                format!("failed to read {}: {}", self.path.display(), e),
            ),
            Ok(Ok(body)) => parse_payload(self.tier, &body),
        }
    }
}
