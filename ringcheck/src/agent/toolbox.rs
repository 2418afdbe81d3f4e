//! Tier tools exposed to the reasoning agent
//!
//! The agent may call any tier zero or more times, in any order. The toolbox
//! makes those calls well-typed and idempotent:
//! - identical `(tier, prompt)` calls are answered from a memo table
//! - the first completed call for a tier decides its availability; if it
//!   failed, later calls short-circuit with the same failure (no retries)
//! - every call is logged and counted
//!
//! After the agent finishes, `settlements()` turns what was invoked into
//! ledger entries; a tier the agent never called is `not_requested`, one
//! whose first call was cut off by the deadline is `timeout`.

use crate::orchestrator::{query_tier, verify_attribution, TierSettlement};
use crate::tiers::{TierFailureKind, TierResult, TierSlot, TierSlots};
use crate::types::{RingAvailability, Tier, TierMap, TierStatement, UnavailableReason};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What the toolbox knows about one tier
#[derive(Debug, Clone, Default)]
enum TierRecord {
    #[default]
    NotInvoked,
    /// First call still running
    Pending,
    Answered {
        statements: Vec<TierStatement>,
        latency: Duration,
    },
    Failed {
        kind: TierFailureKind,
        detail: String,
        latency: Duration,
    },
}

/// One logged tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tier: Tier,
    pub prompt: String,
    pub cached: bool,
    pub success: bool,
}

#[derive(Debug, Default)]
struct ToolboxState {
    memo: HashMap<(Tier, String), TierResult>,
    records: TierMap<TierRecord>,
    calls: Vec<ToolCall>,
}

/// Callable tier capabilities for one scan
pub struct TierToolbox {
    slots: TierSlots,
    timeout: Duration,
    cancel: CancellationToken,
    state: Mutex<ToolboxState>,
}

impl TierToolbox {
    /// # Arguments
    /// * `slots` - Tier slots already restricted to the ring selection
    /// * `timeout` - Per-call timeout
    /// * `cancel` - Scan cancellation token
    pub fn new(slots: TierSlots, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            slots,
            timeout,
            cancel,
            state: Mutex::new(ToolboxState::default()),
        }
    }

    /// Tiers the agent may call
    pub fn callable_tiers(&self) -> Vec<Tier> {
        self.slots
            .iter()
            .filter(|(_, slot)| matches!(slot, TierSlot::Ready(_)))
            .map(|(tier, _)| tier)
            .collect()
    }

    /// Query a tier on behalf of the agent
    pub async fn query(&self, tier: Tier, prompt: &str) -> TierResult {
        let client = match self.slots.get(tier) {
            TierSlot::Ready(client) => Arc::clone(client),
            TierSlot::Excluded => {
                return TierResult::failure(
                    TierFailureKind::NotConfigured,
                    "tier not selected for this scan",
                )
            }
            TierSlot::Unconfigured(reason) => {
                return TierResult::failure(TierFailureKind::NotConfigured, reason.clone())
            }
        };

        let key = (tier, prompt.to_string());
        {
            let mut state = self.state.lock().await;
            let short_circuit = match state.records.get(tier) {
                TierRecord::Failed { kind, detail, .. } => {
                    Some(TierResult::failure(*kind, detail.clone()))
                }
                _ => state.memo.get(&key).cloned(),
            };
            if let Some(result) = short_circuit {
                debug!(tier = %tier, "Tier tool call answered without querying");
                state.calls.push(ToolCall {
                    tier,
                    prompt: prompt.to_string(),
                    cached: true,
                    success: result.is_success(),
                });
                return result;
            }
            let record = state.records.get_mut(tier);
            if matches!(record, TierRecord::NotInvoked) {
                *record = TierRecord::Pending;
            }
        }

        info!(tier = %tier, prompt_len = prompt.len(), "Agent invoked tier tool");
        let (result, latency) =
            query_tier(client, prompt.to_string(), self.timeout, self.cancel.child_token()).await;
        let result = verify_attribution(tier, result);

        let mut state = self.state.lock().await;
        state.calls.push(ToolCall {
            tier,
            prompt: prompt.to_string(),
            cached: false,
            success: result.is_success(),
        });

        let record = state.records.get_mut(tier);
        match &result {
            TierResult::Success { statements } => match record {
                TierRecord::NotInvoked | TierRecord::Pending => {
                    *record = TierRecord::Answered {
                        statements: statements.clone(),
                        latency,
                    };
                }
                TierRecord::Answered {
                    statements: known,
                    latency: total,
                } => {
                    for statement in statements {
                        if !known.contains(statement) {
                            known.push(statement.clone());
                        }
                    }
                    *total += latency;
                }
                TierRecord::Failed { .. } => {}
            },
            // A later failure of an answered tier is returned to the agent only
            TierResult::Failure { kind, detail } => {
                if matches!(record, TierRecord::NotInvoked | TierRecord::Pending) {
                    *record = TierRecord::Failed {
                        kind: *kind,
                        detail: detail.clone(),
                        latency,
                    };
                }
            }
        }

        if result.is_success() {
            state.memo.insert(key, result.clone());
        }
        result
    }

    /// Every call made so far, in order
    pub async fn calls(&self) -> Vec<ToolCall> {
        self.state.lock().await.calls.clone()
    }

    /// Statements gathered for `tier` through tool calls
    pub async fn statements(&self, tier: Tier) -> Vec<TierStatement> {
        match self.state.lock().await.records.get(tier) {
            TierRecord::Answered { statements, .. } => statements.clone(),
            _ => Vec::new(),
        }
    }

    /// Ledger entries and statements derived from the calls the agent made
    pub async fn settlements(&self) -> TierMap<TierSettlement> {
        let state = self.state.lock().await;
        TierMap::from_fn(|tier| match (self.slots.get(tier), state.records.get(tier)) {
            (TierSlot::Excluded, _) => {
                TierSettlement::unavailable(tier, UnavailableReason::NotRequested, "")
            }
            (TierSlot::Unconfigured(reason), _) => {
                TierSettlement::unavailable(tier, UnavailableReason::NotConfigured, reason.clone())
            }
            (TierSlot::Ready(_), TierRecord::NotInvoked) => TierSettlement::unavailable(
                tier,
                UnavailableReason::NotRequested,
                "not invoked by the agent",
            ),
            (TierSlot::Ready(_), TierRecord::Pending) => TierSettlement::unavailable(
                tier,
                UnavailableReason::Timeout,
                "scan ended before the tier answered",
            ),
            (TierSlot::Ready(_), TierRecord::Answered { statements, latency }) => TierSettlement {
                availability: RingAvailability::consulted(
                    tier,
                    latency.as_millis() as u64,
                    statements.len(),
                ),
                statements: statements.clone(),
            },
            (TierSlot::Ready(_), TierRecord::Failed { kind, detail, latency }) => TierSettlement {
                availability: RingAvailability::unavailable(
                    tier,
                    kind.as_reason(),
                    Some(latency.as_millis() as u64),
                    detail.clone(),
                ),
                statements: Vec::new(),
            },
        })
    }
}
