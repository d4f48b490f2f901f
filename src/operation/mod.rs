//! Private Transfer Saga
//!
//! Moves an asset balance from one ledger address to another through a
//! shielded pool, breaking the on-ledger link between the two endpoints.
//!
//! # Architecture
//!
//! The operation module drives a persistent saga stored in a file-backed
//! operation store:
//! - **Ledger** (deposit leg, via JSON-RPC)
//! - **Shielded Pool** (settlement and proof-carrying withdrawal, via HTTP)
//!
//! # State Machine
//!
//! ```text
//! PENDING → DEPOSITING → TRANSFERRING → COMPLETED
//!               ↓              ↓
//!            FAILED ←──────────┘
//!               ↓ (manual/sweep recovery)
//!           COMPLETED
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Persist-Before-Call**: Always write the new state before calling
//!    the service that acts on it
//! 2. **Deposit Proof Rule**: `deposit_proof` is set only after ledger
//!    confirmation; once set, every failure path attempts recovery
//! 3. **No Silent Loss**: A recovery that exhausts its retries leaves the
//!    operation FAILED with a stuck-funds marker, never deletes it
//! 4. **Terminal States Are Final**: COMPLETED and FAILED never transition,
//!    except FAILED → COMPLETED through explicit recovery

pub mod api;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod preconditions;
pub mod recovery;
pub mod retry;
pub mod settlement;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;


// Re-exports for convenience
pub use api::{TransferApiRequest, get_operation_status, start_transfer, submit_transfer};
pub use error::OrchestratorError;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use retry::{Backoff, RetryPolicy};
pub use state::OperationState;
pub use store::{FileStore, MemoryStore, OperationStore};
pub use types::{Asset, Operation, OperationId, TransferRequest};
pub use worker::MaintenanceWorker;
