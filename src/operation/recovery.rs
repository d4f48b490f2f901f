//! Recovery Manager
//!
//! Compensating action for a saga that cannot complete: withdraw whatever
//! remains in the pool back to a safe owner (normally the original source).
//! Deliberately simpler than the transfer executor - no amount negotiation,
//! just "withdraw everything observed", because its job is safety, not
//! precision.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::clients::{PoolClient, TxRef};

use super::retry::RetryPolicy;
use super::types::Asset;

/// Outcome of a recovery attempt
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Funds were moved back to the destination
    pub recovered: bool,
    /// Amount recovered (zero when nothing was recoverable)
    pub amount: Decimal,
    /// Ledger reference of the recovery withdrawal
    pub reference: Option<TxRef>,
    /// Human-readable summary for the operation's error field
    pub note: String,
}

impl RecoveryOutcome {
    fn nothing_to_recover() -> Self {
        Self {
            recovered: false,
            amount: Decimal::ZERO,
            reference: None,
            note: "nothing to recover (pool balance is zero)".to_string(),
        }
    }
}

/// Withdraws remaining pool funds back to a safe destination
pub struct RecoveryManager {
    pool: Arc<dyn PoolClient>,
    policy: RetryPolicy,
}

impl RecoveryManager {
    pub fn new(pool: Arc<dyn PoolClient>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Attempt to move `owner`'s full observed pool balance to `destination`.
    pub async fn recover(&self, owner: &str, asset: Asset, destination: &str) -> RecoveryOutcome {
        let balance = match self.pool.get_balance(owner, asset).await {
            Ok(b) => b,
            Err(e) => {
                error!(owner, %asset, "Recovery balance query failed: {}", e);
                return RecoveryOutcome {
                    recovered: false,
                    amount: Decimal::ZERO,
                    reference: None,
                    note: format!("recovery balance query failed: {}", e),
                };
            }
        };

        if balance.available.is_zero() {
            info!(owner, %asset, "Nothing to recover");
            return RecoveryOutcome::nothing_to_recover();
        }

        let amount = balance.available;
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match self.pool.withdraw(owner, amount, asset, destination).await {
                Ok(tx_ref) => {
                    info!(
                        owner,
                        destination,
                        %amount,
                        %asset,
                        attempt,
                        tx_ref = %tx_ref,
                        "Recovered pool funds"
                    );
                    return RecoveryOutcome {
                        recovered: true,
                        amount,
                        reference: Some(tx_ref),
                        note: format!("recovered {} {} to {}", amount, asset, destination),
                    };
                }
                Err(e) => {
                    warn!(owner, attempt, "Recovery withdrawal failed: {}", e);
                    last_error = e.to_string();
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
            }
        }

        error!(
            owner,
            %asset,
            %amount,
            "Recovery exhausted retries, funds may be stuck in pool"
        );

        RecoveryOutcome {
            recovered: false,
            amount,
            reference: None,
            note: format!(
                "recovery failed after {} attempt(s) ({}): funds may be stuck in pool, manual recovery required",
                self.policy.max_attempts, last_error
            ),
        }
    }
}
