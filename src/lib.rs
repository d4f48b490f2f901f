//! Veilway - Privacy Transfer Orchestrator
//!
//! Moves asset balances between two ledger addresses through a shielded
//! pool so the two endpoints are never linked on-ledger, driving a
//! crash-safe saga with recovery of stuck funds.
//!
//! # Modules
//!
//! - [`clients`] - Ledger, shielded pool and signer service clients
//! - [`operation`] - The transfer saga: store, state machine, orchestrator
//! - [`config`] - YAML configuration loading
//! - [`logging`] - tracing setup with file rotation

pub mod clients;
pub mod config;
pub mod logging;
pub mod operation;

// Convenient re-exports at crate root
pub use clients::{
    ClientError, HttpLedgerClient, HttpPoolClient, HttpSignerClient, KeyProvider, LedgerClient,
    PoolClient,
};
pub use operation::{
    Asset, FileStore, MaintenanceWorker, Operation, OperationId, OperationState, OperationStore,
    Orchestrator, OrchestratorConfig, OrchestratorError, TransferRequest,
};
