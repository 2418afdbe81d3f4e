//! Ring orchestrator
//!
//! Queries every selected tier concurrently and records exactly one
//! availability entry per tier. Failures are isolated per tier: a timeout,
//! auth rejection or malformed response downgrades that tier to
//! `unavailable` and never affects the others. There are no retries.
//!
//! Each tier query runs in its own task under a child of the scan's
//! cancellation token, bounded by the per-tier timeout.

use crate::tiers::{TierClient, TierFailureKind, TierResult, TierSlot, TierSlots};
use crate::types::{
    AvailabilityLedger, RingAvailability, Tier, TierMap, TierStatement, UnavailableReason,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of consulting the ring
#[derive(Debug, Clone)]
pub struct RingOutcome {
    pub ledger: AvailabilityLedger,
    /// Statements from consulted tiers (empty for unavailable tiers)
    pub statements: TierMap<Vec<TierStatement>>,
}

impl RingOutcome {
    /// Assemble an outcome from per-tier settlements
    pub fn from_settlements(settlements: TierMap<TierSettlement>) -> Self {
        let mut statements = TierMap::default();
        let entries = settlements.map(|tier, settlement| {
            *statements.get_mut(tier) = settlement.statements;
            settlement.availability
        });
        let ledger = match AvailabilityLedger::new(entries) {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(error = %e, "Inconsistent tier settlement, marking ring unavailable");
                AvailabilityLedger::all_unavailable(UnavailableReason::MalformedResponse, &e)
            }
        };
        Self { ledger, statements }
    }

    /// All statements from consulted tiers, in tier order
    pub fn all_statements(&self) -> impl Iterator<Item = &TierStatement> {
        self.statements.iter().flat_map(|(_, s)| s.iter())
    }
}

/// Availability and statements for one tier
#[derive(Debug, Clone)]
pub struct TierSettlement {
    pub availability: RingAvailability,
    pub statements: Vec<TierStatement>,
}

impl TierSettlement {
    pub fn unavailable(tier: Tier, reason: UnavailableReason, detail: impl Into<String>) -> Self {
        Self {
            availability: RingAvailability::unavailable(tier, reason, None, detail),
            statements: Vec::new(),
        }
    }
}

/// Parallel tier executor
pub struct RingOrchestrator {
    slots: TierSlots,
    tier_timeout: Duration,
}

impl RingOrchestrator {
    pub fn new(slots: TierSlots, tier_timeout: Duration) -> Self {
        Self {
            slots,
            tier_timeout,
        }
    }

    /// Query all selected tiers in parallel
    ///
    /// # Arguments
    /// * `prompt` - Requirements query sent to every tier
    /// * `cancel` - Scan cancellation; pending tiers settle as `timeout`
    ///
    /// # Returns
    /// Ledger with one entry per tier in fixed order, plus statements from
    /// the consulted tiers.
    pub async fn consult(&self, prompt: &str, cancel: &CancellationToken) -> RingOutcome {
        info!(tiers = Tier::ALL.len(), "Consulting knowledge tiers");
        let start = Instant::now();

        let settlements = join_all(
            Tier::ALL
                .into_iter()
                .map(|tier| self.consult_slot(tier, prompt, cancel)),
        )
        .await;

        let mut settlements = settlements.into_iter();
        let settlements = TierMap::from_fn(|tier| {
            settlements.next().unwrap_or_else(|| {
                TierSettlement::unavailable(tier, UnavailableReason::NotRequested, "")
            })
        });
        let outcome = RingOutcome::from_settlements(settlements);

        info!(
            consulted = outcome.ledger.consulted().len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tier consultation complete"
        );
        outcome
    }

    async fn consult_slot(
        &self,
        tier: Tier,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> TierSettlement {
        match self.slots.get(tier) {
            TierSlot::Excluded => {
                debug!(tier = %tier, "Tier not selected for this scan");
                TierSettlement::unavailable(tier, UnavailableReason::NotRequested, "")
            }
            TierSlot::Unconfigured(reason) => {
                TierSettlement::unavailable(tier, UnavailableReason::NotConfigured, reason.clone())
            }
            TierSlot::Ready(client) => {
                let (result, latency) = query_tier(
                    Arc::clone(client),
                    prompt.to_string(),
                    self.tier_timeout,
                    cancel.child_token(),
                )
                .await;
                settle(tier, result, latency)
            }
        }
    }
}

/// Run one tier query in its own task, bounded by timeout and cancellation
///
/// # Returns
/// The tier's result (a panic in the client maps to `service_unavailable`)
/// and the elapsed wall time.
pub async fn query_tier(
    client: Arc<dyn TierClient>,
    prompt: String,
    timeout: Duration,
    cancel: CancellationToken,
) -> (TierResult, Duration) {
    let start = Instant::now();
    let tier = client.tier();

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                TierResult::failure(TierFailureKind::Timeout, "scan deadline reached")
            }
            result = tokio::time::timeout(timeout, client.query(&prompt, timeout)) => {
                match result {
                    Ok(result) => result,
                    Err(_) => TierResult::failure(
                        TierFailureKind::Timeout,
                        format!("no response within {}ms", timeout.as_millis()),
                    ),
                }
            }
        }
    });

    let result = match handle.await {
        Ok(result) => result,
        Err(e) => {
            warn!(tier = %tier, error = %e, "Tier query task failed");
            TierResult::failure(
                TierFailureKind::ServiceUnavailable,
                format!("tier query task failed: {}", e),
            )
        }
    };

    (result, start.elapsed())
}

/// Downgrade a success carrying statements attributed to another tier
pub fn verify_attribution(tier: Tier, result: TierResult) -> TierResult {
    match result {
        TierResult::Success { statements } => {
            match statements.iter().find(|s| s.tier != tier) {
                Some(stray) => TierResult::failure(
                    TierFailureKind::MalformedResponse,
                    format!("statement attributed to {}", stray.tier),
                ),
                None => TierResult::Success { statements },
            }
        }
        failure => failure,
    }
}

/// Convert a tier result into an availability entry
///
/// A successful response containing statements attributed to another tier
/// is treated as malformed.
pub fn settle(tier: Tier, result: TierResult, latency: Duration) -> TierSettlement {
    let latency_ms = latency.as_millis() as u64;

    match verify_attribution(tier, result) {
        TierResult::Success { statements } => {
            info!(tier = %tier, latency_ms, statements = statements.len(), "Tier consulted");
            TierSettlement {
                availability: RingAvailability::consulted(tier, latency_ms, statements.len()),
                statements,
            }
        }
        TierResult::Failure { kind, detail } => {
            warn!(
                tier = %tier,
                latency_ms,
                reason = %kind,
                detail = %detail,
                "Tier unavailable"
            );
            TierSettlement {
                availability: RingAvailability::unavailable(
                    tier,
                    kind.as_reason(),
                    Some(latency_ms),
                    detail,
                ),
                statements: Vec::new(),
            }
        }
    }
}
