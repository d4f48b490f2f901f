//! Pool Settlement Poller
//!
//! After a deposit confirms on the ledger, the pool's internal ledger takes
//! a while to reflect it. This poller repeatedly queries the pool's reported
//! available balance until it crosses the expected threshold or the attempt
//! budget runs out. Pure polling, never mutates ledger state.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::clients::PoolClient;

use super::retry::RetryPolicy;
use super::types::Asset;

/// Outcome of a settlement wait
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// Threshold reached within the attempt budget
    pub ready: bool,
    /// Last observed available balance
    pub observed: Decimal,
    /// Attempts used
    pub attempts: u32,
}

/// Polls the pool until a deposit settles
pub struct SettlementPoller {
    pool: Arc<dyn PoolClient>,
    policy: RetryPolicy,
}

impl SettlementPoller {
    pub fn new(pool: Arc<dyn PoolClient>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Wait until the pool reports `available >= min_expected` for `owner`.
    ///
    /// Client errors are logged and consume an attempt; the pool being
    /// briefly unreachable looks the same as the pool not having settled.
    pub async fn wait_for_settlement(
        &self,
        owner: &str,
        asset: Asset,
        min_expected: Decimal,
    ) -> SettlementOutcome {
        let mut observed = Decimal::ZERO;

        for attempt in 1..=self.policy.max_attempts {
            match self.pool.get_balance(owner, asset).await {
                Ok(balance) => {
                    observed = balance.available;
                    debug!(
                        owner,
                        %asset,
                        attempt,
                        available = %balance.available,
                        deposited = %balance.deposited,
                        min_expected = %min_expected,
                        "Settlement poll"
                    );

                    if balance.available >= min_expected {
                        return SettlementOutcome {
                            ready: true,
                            observed,
                            attempts: attempt,
                        };
                    }
                }
                Err(e) => {
                    warn!(owner, %asset, attempt, "Settlement poll failed: {}", e);
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_for(attempt)).await;
            }
        }

        warn!(
            owner,
            %asset,
            attempts = self.policy.max_attempts,
            last_observed = %observed,
            min_expected = %min_expected,
            "Settlement never reached threshold within budget"
        );

        SettlementOutcome {
            ready: false,
            observed,
            attempts: self.policy.max_attempts,
        }
    }
}
