//! Operation FSM State Definitions
//!
//! State names match the JSON store serialization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation FSM States
///
/// Terminal states: COMPLETED, FAILED. The only edge out of a terminal
/// state is FAILED -> COMPLETED, taken when a manual or scheduled recovery
/// resolves a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationState {
    /// Request validated and recorded, no ledger calls made yet
    Pending,

    /// Deposit transaction submitted to the ledger (persist-before-call)
    Depositing,

    /// Deposit confirmed - funds are POOL-SIDE
    /// CRITICAL: must eventually reach COMPLETED or FAILED
    Transferring,

    /// Terminal: withdrawal to recipient confirmed
    Completed,

    /// Terminal: saga gave up; error records the recovery outcome
    Failed,
}

impl OperationState {
    /// Check if this is a terminal state (no automatic transitions remain)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Completed | OperationState::Failed)
    }

    /// Check if funds have left source custody but not yet reached a
    /// terminal resolution
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, OperationState::Transferring)
    }

    /// Check whether `next` is a documented edge from this state.
    ///
    /// Out-of-order transitions are logged by the orchestrator but still
    /// applied (tolerant of races between recovery and normal completion).
    pub fn can_transition(&self, next: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, next),
            (Pending, Depositing)
                | (Pending, Failed)
                | (Depositing, Transferring)
                | (Depositing, Failed)
                | (Transferring, Completed)
                | (Transferring, Failed)
                | (Failed, Completed)
        )
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "PENDING",
            OperationState::Depositing => "DEPOSITING",
            OperationState::Transferring => "TRANSFERRING",
            OperationState::Completed => "COMPLETED",
            OperationState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
