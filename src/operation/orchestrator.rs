//! Operation Orchestrator
//!
//! The saga controller. Validates preconditions, deduplicates concurrent
//! requests for the same (source, target, asset) tuple, drives the state
//! machine Pending -> Depositing -> Transferring -> Completed / Failed,
//! and persists every transition before the next network call.
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Call**: every state transition is flushed to the
//!    store before the next external call is issued, so a crash leaves the
//!    store as the single source of truth.
//! 2. **Funds-In-Flight**: once `deposit_proof` is set the funds are
//!    pool-side; every failure path from there must attempt recovery and
//!    record its outcome.
//! 3. **No Auto-Resume**: crashed operations are not resumed on restart;
//!    they stay visible via `get_status`/`list_pending` for the maintenance
//!    sweep or an operator.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::clients::{KeyProvider, LedgerClient, PoolClient};

use super::error::OrchestratorError;
use super::executor::TransferExecutor;
use super::preconditions::PreconditionChecker;
use super::recovery::{RecoveryManager, RecoveryOutcome};
use super::retry::{Backoff, RetryPolicy};
use super::settlement::SettlementPoller;
use super::state::OperationState;
use super::store::OperationStore;
use super::types::{Operation, OperationId, TransferRequest};

/// Orchestrator tuning knobs, all config-loadable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Deduplication window (milliseconds)
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: i64,
    /// Fixed fee headroom required on top of the transfer amount
    #[serde(default = "default_fee_reserve")]
    pub fee_reserve: Decimal,
    /// Fee rate the pool takes from a deposit (e.g. 0.01 = 1%)
    #[serde(default = "default_pool_fee_rate")]
    pub pool_fee_rate: Decimal,
    /// Rounding tolerance applied to the settlement threshold
    #[serde(default = "default_settlement_tolerance")]
    pub settlement_tolerance: Decimal,
    /// Completed operations retained at least this long
    #[serde(default = "default_completed_retention_hours")]
    pub completed_retention_hours: i64,
    /// Failed operations retained at least this long (manual recovery window)
    #[serde(default = "default_failed_retention_days")]
    pub failed_retention_days: i64,
    #[serde(default = "default_settlement_retry")]
    pub settlement_retry: RetryPolicy,
    #[serde(default = "default_transfer_retry")]
    pub transfer_retry: RetryPolicy,
    #[serde(default = "default_recovery_retry")]
    pub recovery_retry: RetryPolicy,
}

fn default_dedup_window_ms() -> i64 {
    30_000
}

fn default_fee_reserve() -> Decimal {
    Decimal::new(5, 2) // 0.05
}

fn default_pool_fee_rate() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_settlement_tolerance() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_completed_retention_hours() -> i64 {
    24
}

fn default_failed_retention_days() -> i64 {
    7
}

fn default_settlement_retry() -> RetryPolicy {
    RetryPolicy::new(
        12,
        Duration::from_secs(5),
        Backoff::Stepped { after: 4, factor: 4 },
    )
}

fn default_transfer_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(5), Backoff::Linear)
}

fn default_recovery_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_secs(2), Backoff::Linear)
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window_ms(),
            fee_reserve: default_fee_reserve(),
            pool_fee_rate: default_pool_fee_rate(),
            settlement_tolerance: default_settlement_tolerance(),
            completed_retention_hours: default_completed_retention_hours(),
            failed_retention_days: default_failed_retention_days(),
            settlement_retry: default_settlement_retry(),
            transfer_retry: default_transfer_retry(),
            recovery_retry: default_recovery_retry(),
        }
    }
}

/// Result of a manual recovery request
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub recovered: bool,
    pub recovered_amount: Decimal,
    pub recovery_ref: Option<String>,
}

/// Result of a retention sweep
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub kept: usize,
}

/// Saga controller for private transfer operations
pub struct Orchestrator {
    store: Arc<dyn OperationStore>,
    pool: Arc<dyn PoolClient>,
    ledger: Arc<dyn LedgerClient>,
    keys: Arc<dyn KeyProvider>,
    checker: PreconditionChecker,
    poller: SettlementPoller,
    executor: TransferExecutor,
    recovery: RecoveryManager,
    config: OrchestratorConfig,
    /// Makes the dedup scan + Pending insert atomic across concurrent submits
    submit_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn OperationStore>,
        ledger: Arc<dyn LedgerClient>,
        pool: Arc<dyn PoolClient>,
        keys: Arc<dyn KeyProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            checker: PreconditionChecker::new(ledger.clone(), config.fee_reserve),
            poller: SettlementPoller::new(pool.clone(), config.settlement_retry.clone()),
            executor: TransferExecutor::new(pool.clone(), config.transfer_retry.clone()),
            recovery: RecoveryManager::new(pool.clone(), config.recovery_retry.clone()),
            store,
            pool,
            ledger,
            keys,
            config,
            submit_lock: Mutex::new(()),
        }
    }

    // ------------------------------------------------------------------
    // Public surface
    // ------------------------------------------------------------------

    /// Run a transfer saga to a terminal state.
    ///
    /// Returns the terminal Operation. Validation, dedup and precondition
    /// failures reject the request without persisting anything.
    pub async fn submit(
        self: &Arc<Self>,
        request: TransferRequest,
    ) -> Result<Operation, OrchestratorError> {
        let op = self.begin(&request).await?;
        Ok(self.clone().run_saga(op).await)
    }

    /// Fire-and-forget variant of [`submit`](Self::submit): persists the
    /// Pending record, spawns the saga as a background task, and returns
    /// the operation id immediately.
    pub async fn start(
        self: &Arc<Self>,
        request: TransferRequest,
    ) -> Result<OperationId, OrchestratorError> {
        let op = self.begin(&request).await?;
        let id = op.id;

        let this = self.clone();
        tokio::spawn(async move {
            let terminal = this.run_saga(op).await;
            info!(op_id = %terminal.id, state = %terminal.state, "Background saga finished");
        });

        Ok(id)
    }

    /// Operation snapshot for status polling
    pub fn get_status(&self, id: OperationId) -> Result<Operation, OrchestratorError> {
        self.store
            .get(id)
            .map_err(|e| OrchestratorError::StoreError(e.to_string()))?
            .ok_or_else(|| OrchestratorError::OperationNotFound(id.to_string()))
    }

    /// All non-terminal operations, oldest first
    pub fn list_pending(&self) -> Result<Vec<Operation>, OrchestratorError> {
        let mut pending: Vec<Operation> = self
            .scan()?
            .into_iter()
            .filter(|op| !op.state.is_terminal())
            .collect();
        pending.sort_by_key(|op| op.created_at);
        Ok(pending)
    }

    /// FAILED operations whose deposit landed (funds pool-side), oldest
    /// first. Candidates for the maintenance recovery sweep.
    pub fn list_failed_with_deposits(&self) -> Result<Vec<Operation>, OrchestratorError> {
        let mut failed: Vec<Operation> = self
            .scan()?
            .into_iter()
            .filter(|op| op.is_failed() && op.deposit_proof.is_some())
            .collect();
        failed.sort_by_key(|op| op.created_at);
        Ok(failed)
    }

    /// Manually re-run recovery for a FAILED operation.
    ///
    /// On success the operation takes the FAILED -> COMPLETED edge and its
    /// error is cleared.
    pub async fn recover_failed(
        &self,
        id: OperationId,
    ) -> Result<RecoveryReport, OrchestratorError> {
        let mut op = self.get_status(id)?;

        if op.state != OperationState::Failed {
            return Err(OrchestratorError::InvalidState {
                id,
                state: op.state.as_str(),
                expected: OperationState::Failed.as_str(),
            });
        }

        let destination = op.source_address.clone();
        let outcome = self
            .recovery
            .recover(&op.source_address, op.asset, &destination)
            .await;

        if outcome.recovered {
            op.error = None;
            self.persist(&mut op, OperationState::Completed).await?;
            info!(op_id = %id, amount = %outcome.amount, "Failed operation resolved by manual recovery");
        }

        Ok(RecoveryReport {
            recovered: outcome.recovered,
            recovered_amount: outcome.amount,
            recovery_ref: outcome.reference.map(|r| r.0),
        })
    }

    /// Apply the retention policy: COMPLETED past 24h and FAILED past 7d
    /// (by default) are deleted, everything else is kept.
    pub fn cleanup(&self) -> Result<CleanupReport, OrchestratorError> {
        let now = chrono::Utc::now().timestamp_millis();
        let completed_retention_ms = self.config.completed_retention_hours * 3_600_000;
        let failed_retention_ms = self.config.failed_retention_days * 86_400_000;

        let mut removed = 0;
        let mut kept = 0;

        for op in self.scan()? {
            let age = now - op.updated_at;
            let expired = match op.state {
                OperationState::Completed => age > completed_retention_ms,
                OperationState::Failed => age > failed_retention_ms,
                _ => false,
            };

            if expired {
                self.store
                    .remove(op.id)
                    .map_err(|e| OrchestratorError::StoreError(e.to_string()))?;
                info!(op_id = %op.id, state = %op.state, "Removed expired operation");
                removed += 1;
            } else {
                kept += 1;
            }
        }

        Ok(CleanupReport { removed, kept })
    }

    // ------------------------------------------------------------------
    // Admission: validation, dedup, precondition, Pending insert
    // ------------------------------------------------------------------

    async fn begin(&self, request: &TransferRequest) -> Result<Operation, OrchestratorError> {
        if request.amount <= Decimal::ZERO {
            return Err(OrchestratorError::InvalidAmount);
        }
        if request.source_address == request.target_address {
            return Err(OrchestratorError::SameAddress);
        }
        if !self.keys.can_sign(&request.source_address).await {
            return Err(OrchestratorError::UnknownSource(
                request.source_address.clone(),
            ));
        }

        // Cheap duplicate check before touching the ledger
        if let Some(existing) = self.find_duplicate(request)? {
            return Err(OrchestratorError::DuplicateInProgress(existing));
        }

        // Advisory balance check; the deposit call stays authoritative
        let check = self
            .checker
            .check(&request.source_address, request.amount, request.asset)
            .await?;
        if !check.sufficient {
            return Err(OrchestratorError::InsufficientBalance {
                reason: check
                    .reason
                    .unwrap_or_else(|| "insufficient balance".to_string()),
            });
        }

        // Scan-again-then-insert under the lock so two racing submits for
        // the same key cannot both pass the dedup check
        let _guard = self.submit_lock.lock().await;
        if let Some(existing) = self.find_duplicate(request)? {
            return Err(OrchestratorError::DuplicateInProgress(existing));
        }

        let op = Operation::new(request);
        self.store
            .put(&op)
            .map_err(|e| OrchestratorError::StoreError(e.to_string()))?;

        info!(
            op_id = %op.id,
            source = %op.source_address,
            target = %op.target_address,
            amount = %op.amount,
            asset = %op.asset,
            "Operation created"
        );
        Ok(op)
    }

    fn find_duplicate(
        &self,
        request: &TransferRequest,
    ) -> Result<Option<OperationId>, OrchestratorError> {
        let now = chrono::Utc::now().timestamp_millis();
        Ok(self
            .scan()?
            .into_iter()
            .find(|op| {
                !op.state.is_terminal()
                    && op.matches_key(request)
                    && op.age_millis(now) <= self.config.dedup_window_ms
            })
            .map(|op| op.id))
    }

    fn scan(&self) -> Result<Vec<Operation>, OrchestratorError> {
        self.store
            .scan()
            .map_err(|e| OrchestratorError::StoreError(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Saga
    // ------------------------------------------------------------------

    async fn run_saga(self: Arc<Self>, mut op: Operation) -> Operation {
        // 1. Prepare the deposit (pool builds the transaction)
        let prepared = match self
            .pool
            .prepare_deposit(&op.source_address, op.amount, op.asset)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                return self
                    .fail_without_recovery(op, format!("deposit preparation failed: {}", e))
                    .await;
            }
        };

        op.pool_address = Some(prepared.pool_address.clone());
        if let Err(e) = self.persist(&mut op, OperationState::Depositing).await {
            return self
                .fail_without_recovery(op, format!("persist failed before deposit: {}", e))
                .await;
        }

        // 2. Sign and submit the deposit
        let signed = match self.keys.sign(&op.source_address, &prepared.unsigned_tx).await {
            Ok(s) => s,
            Err(e) => {
                return self
                    .fail_without_recovery(op, format!("deposit signing failed: {}", e))
                    .await;
            }
        };

        let deposit_ref = match self.ledger.submit(&signed).await {
            Ok(r) => r,
            Err(e) => {
                return self
                    .fail_without_recovery(op, format!("deposit submission failed: {}", e))
                    .await;
            }
        };

        // 3. Bounded wait for ledger confirmation. On timeout the deposit
        //    is treated as never landed: deposit_proof stays absent and no
        //    recovery runs.
        if let Err(e) = self.ledger.confirm(&deposit_ref).await {
            return self
                .fail_without_recovery(op, format!("deposit confirmation failed: {}", e))
                .await;
        }

        // Funds have left source custody from this point on
        op.deposit_proof = Some(deposit_ref.0.clone());
        if let Err(e) = self.persist(&mut op, OperationState::Transferring).await {
            return self
                .fail_with_recovery(op, format!("persist failed after deposit: {}", e))
                .await;
        }
        info!(op_id = %op.id, deposit_proof = %deposit_ref, "Deposit confirmed");

        // 4. Wait for the pool to settle the deposit
        let min_expected = self.settlement_threshold(op.amount);
        let settlement = self
            .poller
            .wait_for_settlement(&op.source_address, op.asset, min_expected)
            .await;

        if !settlement.ready {
            return self
                .fail_with_recovery(
                    op,
                    format!(
                        "pool settlement never reached {} (last observed {}) within {} attempt(s)",
                        min_expected, settlement.observed, settlement.attempts
                    ),
                )
                .await;
        }

        // 5. Withdraw to the recipient, with retry
        let withdraw_amount = settlement.observed;
        match self
            .executor
            .execute(
                &op.source_address,
                &op.target_address,
                withdraw_amount,
                op.asset,
            )
            .await
        {
            Ok(transfer_ref) => {
                op.transfer_proof = Some(transfer_ref.0.clone());
                if let Err(e) = self.persist(&mut op, OperationState::Completed).await {
                    error!(op_id = %op.id, "Persist failed after completed transfer: {}", e);
                }
                info!(op_id = %op.id, transfer_proof = %transfer_ref, "Operation completed");
                op
            }
            Err(failure) => self.fail_with_recovery(op, failure.to_string()).await,
        }
    }

    /// `amount * (1 - pool_fee_rate) * (1 - tolerance)`
    fn settlement_threshold(&self, amount: Decimal) -> Decimal {
        amount
            * (Decimal::ONE - self.config.pool_fee_rate)
            * (Decimal::ONE - self.config.settlement_tolerance)
    }

    /// Terminal failure before any funds left the source. No recovery.
    async fn fail_without_recovery(&self, mut op: Operation, reason: String) -> Operation {
        warn!(op_id = %op.id, "Operation failed before funds moved: {}", reason);
        op.error = Some(reason);
        if let Err(e) = self.persist(&mut op, OperationState::Failed).await {
            error!(op_id = %op.id, "Persist failed while marking FAILED: {}", e);
        }
        op
    }

    /// Terminal failure after the deposit landed: attempt recovery back to
    /// the source and record the outcome in the error field.
    async fn fail_with_recovery(&self, mut op: Operation, reason: String) -> Operation {
        warn!(op_id = %op.id, "Operation failed with funds pool-side: {}", reason);

        let destination = op.source_address.clone();
        let outcome = self
            .recovery
            .recover(&op.source_address, op.asset, &destination)
            .await;

        op.error = Some(self.describe_failure(&reason, &outcome));
        if !outcome.recovered && outcome.amount > Decimal::ZERO {
            error!(
                op_id = %op.id,
                amount = %outcome.amount,
                "FUNDS MAY BE STUCK IN POOL, manual recovery required"
            );
        }

        if let Err(e) = self.persist(&mut op, OperationState::Failed).await {
            error!(op_id = %op.id, "Persist failed while marking FAILED: {}", e);
        }
        op
    }

    fn describe_failure(&self, reason: &str, outcome: &RecoveryOutcome) -> String {
        if outcome.recovered {
            let reference = outcome
                .reference
                .as_ref()
                .map(|r| r.as_str())
                .unwrap_or("unknown");
            format!(
                "{}; recovered {} to source (ref {}) (recovered: true)",
                reason, outcome.amount, reference
            )
        } else {
            format!("{}; {} (recovered: false)", reason, outcome.note)
        }
    }

    /// Flush an operation with a state transition. Undocumented edges are
    /// logged but still applied. Store writes get a short retry so a
    /// transient IO error cannot silently drop a transition.
    async fn persist(
        &self,
        op: &mut Operation,
        next: OperationState,
    ) -> Result<(), OrchestratorError> {
        if op.state != next && !op.state.can_transition(next) {
            warn!(
                op_id = %op.id,
                from = %op.state,
                to = %next,
                "Out-of-order state transition"
            );
        }

        op.state = next;
        op.updated_at = chrono::Utc::now().timestamp_millis();
        if next != OperationState::Failed {
            op.error = None;
        }

        let mut last_err = None;
        for _ in 0..3 {
            match self.store.put(op) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(op_id = %op.id, "Store write failed, retrying: {}", e);
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        Err(OrchestratorError::StoreError(
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        ))
    }
}
