//! Client Error Types
//!
//! Typed errors for the ledger, pool, and signer collaborators.
//! Recoverability is a property of the variant, not a substring heuristic:
//! the HTTP clients classify remote error payloads once, at the wire
//! boundary, and the saga components only consult `is_recoverable()`.

use thiserror::Error;

/// Errors returned by external collaborators
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    // === Non-recoverable: retrying cannot help ===
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    BadResponse(String),

    // === Recoverable: transient, retry with backoff ===
    #[error("confirmation timed out: {0}")]
    ConfirmationTimeout(String),

    #[error("transaction expired: {0}")]
    Expired(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether a retry with backoff can plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::InsufficientBalance(_)
            | ClientError::Rejected(_)
            | ClientError::BadResponse(_) => false,
            ClientError::ConfirmationTimeout(_)
            | ClientError::Expired(_)
            | ClientError::RateLimited(_)
            | ClientError::Transport(_)
            | ClientError::Unavailable(_) => true,
        }
    }

    /// Classify a remote error message into a typed variant.
    ///
    /// Used by the HTTP clients when a collaborator returns a bare error
    /// string. Pattern matching lives here and nowhere else.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("insufficient") {
            ClientError::InsufficientBalance(message)
        } else if lower.contains("expired") || lower.contains("blockhash") {
            ClientError::Expired(message)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            ClientError::ConfirmationTimeout(message)
        } else if lower.contains("rate") && lower.contains("limit") {
            ClientError::RateLimited(message)
        } else {
            ClientError::Rejected(message)
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::ConfirmationTimeout(e.to_string())
        } else if e.is_decode() {
            ClientError::BadResponse(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}
