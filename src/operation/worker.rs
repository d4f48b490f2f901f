//! Maintenance Worker
//!
//! Background loop that applies the retention policy and, when enabled,
//! re-attempts recovery for FAILED operations whose deposit landed
//! (funds pool-side). Crashed operations are not auto-resumed; this sweep
//! and the manual `recover_failed` call are the only interventions.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::orchestrator::Orchestrator;

/// Configuration for the maintenance worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// How often to run a sweep (seconds)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Maximum failed operations to re-recover per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Re-attempt recovery of failed operations with pool-side funds
    #[serde(default)]
    pub auto_recover: bool,
}

fn default_scan_interval() -> u64 {
    300
}

fn default_batch_size() -> usize {
    20
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            batch_size: default_batch_size(),
            auto_recover: false,
        }
    }
}

/// Periodic retention + recovery sweep
pub struct MaintenanceWorker {
    orchestrator: Arc<Orchestrator>,
    config: WorkerConfig,
}

impl MaintenanceWorker {
    pub fn new(orchestrator: Arc<Orchestrator>, config: WorkerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Run the sweep loop forever
    pub async fn run(&self) -> ! {
        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            auto_recover = self.config.auto_recover,
            "Starting maintenance worker"
        );

        loop {
            self.sweep().await;
            tokio::time::sleep(Duration::from_secs(self.config.scan_interval_secs)).await;
        }
    }

    /// Run a single sweep cycle
    pub async fn sweep(&self) {
        match self.orchestrator.cleanup() {
            Ok(report) => {
                if report.removed > 0 {
                    info!(
                        removed = report.removed,
                        kept = report.kept,
                        "Retention sweep removed expired operations"
                    );
                } else {
                    debug!(kept = report.kept, "Retention sweep found nothing expired");
                }
            }
            Err(e) => error!("Retention sweep failed: {}", e),
        }

        if self.config.auto_recover {
            self.recover_failed_batch().await;
        }
    }

    async fn recover_failed_batch(&self) {
        let failed = match self.orchestrator.list_failed_with_deposits() {
            Ok(ops) => ops,
            Err(e) => {
                error!("Failed-operation scan failed: {}", e);
                return;
            }
        };

        if failed.is_empty() {
            return;
        }

        info!(count = failed.len(), "Sweeping failed operations for recovery");

        for op in failed.iter().take(self.config.batch_size) {
            match self.orchestrator.recover_failed(op.id).await {
                Ok(report) if report.recovered => {
                    info!(
                        op_id = %op.id,
                        amount = %report.recovered_amount,
                        "Sweep recovered stuck funds"
                    );
                }
                Ok(_) => {
                    debug!(op_id = %op.id, "Sweep found nothing recoverable");
                }
                Err(e) => {
                    warn!(op_id = %op.id, "Sweep recovery failed: {}", e);
                }
            }
        }
    }
}
