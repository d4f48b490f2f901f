//! Transfer Executor
//!
//! Issues the proof-carrying withdrawal from the pool to the recipient,
//! with bounded retry. Recoverable errors (timeouts, expiry, transient
//! transport failures) are retried with linear backoff; non-recoverable
//! errors abort immediately.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::clients::{ClientError, PoolClient, TxRef};

use super::retry::RetryPolicy;
use super::types::Asset;

/// Failure after the executor gives up
#[derive(Debug, Clone)]
pub struct ExecutionFailure {
    /// Last error observed
    pub error: ClientError,
    /// Attempts used before giving up
    pub attempts: u32,
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "withdrawal failed after {} attempt(s): {}",
            self.attempts, self.error
        )
    }
}

/// Withdrawal-to-recipient with bounded retry
pub struct TransferExecutor {
    pool: Arc<dyn PoolClient>,
    policy: RetryPolicy,
}

impl TransferExecutor {
    pub fn new(pool: Arc<dyn PoolClient>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    /// Withdraw `amount` from `owner`'s pool balance to `recipient`.
    pub async fn execute(
        &self,
        owner: &str,
        recipient: &str,
        amount: Decimal,
        asset: Asset,
    ) -> Result<TxRef, ExecutionFailure> {
        let mut last_error = None;

        for attempt in 1..=self.policy.max_attempts {
            match self.pool.withdraw(owner, amount, asset, recipient).await {
                Ok(tx_ref) => {
                    info!(
                        owner,
                        recipient,
                        %amount,
                        %asset,
                        attempt,
                        tx_ref = %tx_ref,
                        "Withdrawal to recipient succeeded"
                    );
                    return Ok(tx_ref);
                }
                Err(e) if e.is_recoverable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        owner,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Withdrawal attempt failed, retrying: {}",
                        e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if !e.is_recoverable() {
                        warn!(owner, attempt, "Withdrawal failed fatally: {}", e);
                    } else {
                        warn!(
                            owner,
                            attempt, "Withdrawal retry budget exhausted: {}", e
                        );
                    }
                    return Err(ExecutionFailure { error: e, attempts: attempt });
                }
            }
        }

        // max_attempts >= 1, so the loop always returns before this point
        // unless every iteration hit the retry arm
        Err(ExecutionFailure {
            error: last_error
                .unwrap_or_else(|| ClientError::Rejected("no attempt was made".to_string())),
            attempts: self.policy.max_attempts,
        })
    }
}
