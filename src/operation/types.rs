//! Operation Core Types
//!
//! Type definitions for the private-transfer saga.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::OperationState;

/// Operation ID - ULID-based unique identifier
///
/// Using ULID provides:
/// - Monotonic, sortable IDs
/// - No coordination needed between instances
/// - 128-bit with good entropy, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(ulid::Ulid);

impl OperationId {
    /// Generate a new unique OperationId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Get the inner ULID value
    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

/// Supported asset symbols (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Sol,
    Usdc,
    Usdt,
}

impl Asset {
    /// Get canonical symbol
    pub fn as_str(&self) -> &'static str {
        match self {
            Asset::Sol => "SOL",
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
        }
    }

    /// Parse from a case-insensitive symbol
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SOL" => Some(Asset::Sol),
            "USDC" => Some(Asset::Usdc),
            "USDT" => Some(Asset::Usdt),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transfer request accepted by the orchestrator
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Ledger address funds leave from (must be signable by this service)
    pub source_address: String,
    /// Final recipient address (need not be controlled by this service)
    pub target_address: String,
    /// Positive decimal quantity
    pub amount: Decimal,
    /// Asset symbol
    pub asset: Asset,
}

impl TransferRequest {
    pub fn new(
        source_address: impl Into<String>,
        target_address: impl Into<String>,
        amount: Decimal,
        asset: Asset,
    ) -> Self {
        Self {
            source_address: source_address.into(),
            target_address: target_address.into(),
            amount,
            asset,
        }
    }

    /// Dedup key: one non-terminal operation per key within the window
    pub fn dedup_key(&self) -> (&str, &str, Asset) {
        (&self.source_address, &self.target_address, self.asset)
    }
}

/// Operation record persisted in the store
///
/// The only entity with a lifecycle. Mutated exclusively by the orchestrator;
/// immutable history once COMPLETED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation ID (ULID, also the store primary key)
    pub id: OperationId,
    /// Source ledger address
    pub source_address: String,
    /// Target ledger address
    pub target_address: String,
    /// Decimal quantity to move
    pub amount: Decimal,
    /// Asset symbol
    pub asset: Asset,
    /// Current FSM state
    pub state: OperationState,
    /// Ledger reference of the confirmed deposit into the pool.
    /// Presence means funds have left source custody.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_proof: Option<String>,
    /// Ledger reference of the withdrawal to the recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_proof: Option<String>,
    /// Pool account used for this operation, attached once known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<String>,
    /// Last error, present only while state == FAILED.
    /// Records both the original failure and the recovery outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Created timestamp (millis)
    pub created_at: i64,
    /// Last updated timestamp (millis)
    pub updated_at: i64,
}

impl Operation {
    /// Create a new operation in PENDING state
    pub fn new(request: &TransferRequest) -> Self {
        let now = chrono::Utc::now().timestamp_millis();

        Self {
            id: OperationId::new(),
            source_address: request.source_address.clone(),
            target_address: request.target_address.clone(),
            amount: request.amount,
            asset: request.asset,
            state: OperationState::Pending,
            deposit_proof: None,
            transfer_proof: None,
            pool_address: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the operation reached COMPLETED
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.state == OperationState::Completed
    }

    /// True once the operation reached FAILED
    #[inline]
    pub fn is_failed(&self) -> bool {
        self.state == OperationState::Failed
    }

    /// True while the saga is still running
    #[inline]
    pub fn is_pending(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Check dedup match against a request
    pub fn matches_key(&self, request: &TransferRequest) -> bool {
        self.source_address == request.source_address
            && self.target_address == request.target_address
            && self.asset == request.asset
    }

    /// Age since creation, in milliseconds
    pub fn age_millis(&self, now: i64) -> i64 {
        now - self.created_at
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Operation[{}] {} -> {} amount={} {} state={}",
            self.id, self.source_address, self.target_address, self.amount, self.asset, self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransferRequest {
        TransferRequest::new("src-addr", "dst-addr", Decimal::from(10), Asset::Usdc)
    }

    #[test]
    fn test_operation_id_unique_and_parsable() {
        let a = OperationId::new();
        let b = OperationId::new();
        assert_ne!(a, b);

        let parsed: OperationId = a.to_string().parse().unwrap();
        assert_eq!(parsed, a);
    }

    #[test]
    fn test_asset_parse() {
        assert_eq!(Asset::parse("usdc"), Some(Asset::Usdc));
        assert_eq!(Asset::parse("USDC"), Some(Asset::Usdc));
        assert_eq!(Asset::parse("Sol"), Some(Asset::Sol));
        assert_eq!(Asset::parse("USDT"), Some(Asset::Usdt));
        assert_eq!(Asset::parse("DOGE"), None);
    }

    #[test]
    fn test_operation_new() {
        let op = Operation::new(&request());
        assert_eq!(op.state, OperationState::Pending);
        assert!(op.deposit_proof.is_none());
        assert!(op.transfer_proof.is_none());
        assert!(op.pool_address.is_none());
        assert!(op.error.is_none());
        assert!(op.is_pending());
        assert!(!op.is_complete());
        assert!(!op.is_failed());
    }

    #[test]
    fn test_matches_key_ignores_amount() {
        let op = Operation::new(&request());

        let same_key = TransferRequest::new("src-addr", "dst-addr", Decimal::from(25), Asset::Usdc);
        assert!(op.matches_key(&same_key));

        let other_asset = TransferRequest::new("src-addr", "dst-addr", Decimal::from(10), Asset::Sol);
        assert!(!op.matches_key(&other_asset));

        let other_target = TransferRequest::new("src-addr", "elsewhere", Decimal::from(10), Asset::Usdc);
        assert!(!op.matches_key(&other_target));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut op = Operation::new(&request());
        op.deposit_proof = Some("tx-123".to_string());
        op.pool_address = Some("pool-addr".to_string());

        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, op.id);
        assert_eq!(back.amount, op.amount);
        assert_eq!(back.asset, op.asset);
        assert_eq!(back.deposit_proof.as_deref(), Some("tx-123"));
        assert!(back.transfer_proof.is_none());
    }
}
