//! Veilway - Privacy Transfer Orchestrator
//!
//! Service entry point. Architecture:
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Orchestrator │───▶│ Ledger/Pool/ │───▶│  Store   │
//! │  (YAML)  │    │   (Saga)     │    │   Signer     │    │ (JSON)   │
//! └──────────┘    └──────────────┘    └──────────────┘    └──────────┘
//!
//! Orchestrator responsibilities:
//! - Operation store (persistence first!)
//! - Deposit / Settle / Withdraw saga
//! - Recovery of stuck pool funds
//! ```

use std::sync::Arc;

use veilway::clients::{HttpLedgerClient, HttpPoolClient, HttpSignerClient};
use veilway::config::AppConfig;
use veilway::operation::worker::MaintenanceWorker;
use veilway::operation::{FileStore, Orchestrator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = veilway::logging::init_logging(&config);

    tracing::info!("Starting Veilway orchestrator in {} mode", env);

    let ledger = Arc::new(HttpLedgerClient::new(config.ledger.clone())?);
    let pool = Arc::new(HttpPoolClient::new(config.pool.clone())?);
    let signer = Arc::new(HttpSignerClient::new(config.signer.clone())?);
    let store = Arc::new(FileStore::open(&config.data_dir)?);

    tracing::info!(
        ledger = %config.ledger.rpc_url,
        pool = %config.pool.base_url,
        signer = %config.signer.base_url,
        data_dir = %config.data_dir,
        "Collaborator clients ready"
    );

    let orchestrator = Arc::new(Orchestrator::new(
        store,
        ledger,
        pool,
        signer,
        config.orchestrator.clone(),
    ));

    let pending = orchestrator.list_pending()?;
    if !pending.is_empty() {
        tracing::warn!(
            count = pending.len(),
            "Found in-flight operations from a previous run; they will not be auto-resumed"
        );
        for op in &pending {
            tracing::warn!(op_id = %op.id, state = %op.state, "In-flight operation");
        }
    }

    let worker = MaintenanceWorker::new(orchestrator, config.worker.clone());
    worker.run().await
}
