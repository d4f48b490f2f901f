//! Orchestrator Error Types

use thiserror::Error;

use crate::clients::ClientError;

use super::types::OperationId;

/// Errors surfaced by the orchestrator and its API layer
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    // === Validation Errors (rejected before anything is persisted) ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(String),

    #[error("Source and target address cannot be the same")]
    SameAddress,

    #[error("Source address is not controlled by this service: {0}")]
    UnknownSource(String),

    // === Precondition Errors (rejected before anything is persisted) ===
    #[error("Insufficient balance: {reason}")]
    InsufficientBalance { reason: String },

    // === Dedup ===
    #[error("Duplicate operation in progress: {0}")]
    DuplicateInProgress(OperationId),

    // === Lookup / lifecycle ===
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Operation {id} is {state}, expected {expected}")]
    InvalidState {
        id: OperationId,
        state: &'static str,
        expected: &'static str,
    },

    // === System ===
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

impl OrchestratorError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidAmount => "INVALID_AMOUNT",
            OrchestratorError::UnsupportedAsset(_) => "UNSUPPORTED_ASSET",
            OrchestratorError::SameAddress => "SAME_ADDRESS",
            OrchestratorError::UnknownSource(_) => "UNKNOWN_SOURCE",
            OrchestratorError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            OrchestratorError::DuplicateInProgress(_) => "DUPLICATE_IN_PROGRESS",
            OrchestratorError::OperationNotFound(_) => "OPERATION_NOT_FOUND",
            OrchestratorError::InvalidState { .. } => "INVALID_STATE",
            OrchestratorError::StoreError(_) => "STORE_ERROR",
            OrchestratorError::Client(_) => "CLIENT_ERROR",
        }
    }

    /// HTTP status suggestion for the route layer
    pub fn http_status(&self) -> u16 {
        match self {
            OrchestratorError::InvalidAmount
            | OrchestratorError::UnsupportedAsset(_)
            | OrchestratorError::SameAddress => 400,
            OrchestratorError::UnknownSource(_) => 403,
            OrchestratorError::InsufficientBalance { .. } => 422,
            OrchestratorError::DuplicateInProgress(_) => 409,
            OrchestratorError::OperationNotFound(_) => 404,
            OrchestratorError::InvalidState { .. } => 409,
            OrchestratorError::StoreError(_) => 500,
            OrchestratorError::Client(_) => 502,
        }
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        OrchestratorError::StoreError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(OrchestratorError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            OrchestratorError::InsufficientBalance {
                reason: "x".into()
            }
            .code(),
            "INSUFFICIENT_BALANCE"
        );
        assert_eq!(
            OrchestratorError::DuplicateInProgress(OperationId::new()).code(),
            "DUPLICATE_IN_PROGRESS"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(OrchestratorError::InvalidAmount.http_status(), 400);
        assert_eq!(OrchestratorError::SameAddress.http_status(), 400);
        assert_eq!(
            OrchestratorError::UnknownSource("x".into()).http_status(),
            403
        );
        assert_eq!(
            OrchestratorError::InsufficientBalance { reason: "x".into() }.http_status(),
            422
        );
        assert_eq!(
            OrchestratorError::DuplicateInProgress(OperationId::new()).http_status(),
            409
        );
        assert_eq!(
            OrchestratorError::OperationNotFound("x".into()).http_status(),
            404
        );
        assert_eq!(OrchestratorError::StoreError("io".into()).http_status(), 500);
    }
}
