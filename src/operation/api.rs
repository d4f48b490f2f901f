//! Operation API Layer
//!
//! Request/response DTOs and validation for the route layer. Callers always
//! receive a structured outcome with a numeric code and a human-readable
//! message, never a bare panic. Compliance screening happens in the route
//! layer before these functions are called.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::OrchestratorError;
use super::orchestrator::{CleanupReport, Orchestrator, RecoveryReport};
use super::types::{Asset, Operation, OperationId, TransferRequest};

// ============================================================================
// API Request/Response Types
// ============================================================================

/// API request for starting a private transfer
#[derive(Debug, Deserialize)]
pub struct TransferApiRequest {
    /// Source ledger address (must be controlled by this service)
    pub source: String,
    /// Target ledger address
    pub target: String,
    /// Amount as string (to avoid float precision issues)
    pub amount: String,
    /// Asset symbol (e.g. "USDC")
    pub asset: String,
}

/// Operation snapshot returned for submit/status calls
#[derive(Debug, Serialize)]
pub struct OperationApiResponse {
    pub operation_id: String,
    pub status: String,
    pub source: String,
    pub target: String,
    pub amount: String,
    pub asset: String,
    pub is_complete: bool,
    pub is_failed: bool,
    pub is_pending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deposit_proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_proof: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Operation> for OperationApiResponse {
    fn from(op: &Operation) -> Self {
        Self {
            operation_id: op.id.to_string(),
            status: op.state.to_string(),
            source: op.source_address.clone(),
            target: op.target_address.clone(),
            amount: op.amount.to_string(),
            asset: op.asset.to_string(),
            is_complete: op.is_complete(),
            is_failed: op.is_failed(),
            is_pending: op.is_pending(),
            deposit_proof: op.deposit_proof.clone(),
            transfer_proof: op.transfer_proof.clone(),
            pool_address: op.pool_address.clone(),
            error: op.error.clone(),
            created_at: op.created_at,
            updated_at: op.updated_at,
        }
    }
}

/// Response for fire-and-forget submission
#[derive(Debug, Serialize)]
pub struct StartApiResponse {
    pub operation_id: String,
}

/// Response for manual recovery
#[derive(Debug, Serialize)]
pub struct RecoveryApiResponse {
    pub recovered: bool,
    pub recovered_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_ref: Option<String>,
}

impl From<RecoveryReport> for RecoveryApiResponse {
    fn from(report: RecoveryReport) -> Self {
        Self {
            recovered: report.recovered,
            recovered_amount: report.recovered_amount.to_string(),
            recovery_ref: report.recovery_ref,
        }
    }
}

/// Response for a retention sweep
#[derive(Debug, Serialize)]
pub struct CleanupApiResponse {
    pub removed: usize,
    pub kept: usize,
}

impl From<CleanupReport> for CleanupApiResponse {
    fn from(report: CleanupReport) -> Self {
        Self {
            removed: report.removed,
            kept: report.kept,
        }
    }
}

/// API wrapper for the standard response format
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Operation id for later polling, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            data: Some(data),
            msg: None,
            operation_id: None,
        }
    }

    pub fn error(code: i32, msg: impl ToString) -> Self {
        Self {
            code,
            data: None,
            msg: Some(msg.to_string()),
            operation_id: None,
        }
    }

    pub fn with_operation_id(mut self, id: OperationId) -> Self {
        self.operation_id = Some(id.to_string());
        self
    }
}

// ============================================================================
// Error Codes
// ============================================================================

pub mod error_codes {
    pub const INVALID_PARAMETER: i32 = -1001;
    pub const INVALID_AMOUNT: i32 = -1002;
    pub const UNSUPPORTED_ASSET: i32 = -1003;
    pub const SAME_ADDRESS: i32 = -1004;
    pub const INSUFFICIENT_BALANCE: i32 = -2001;
    pub const UNKNOWN_SOURCE: i32 = -2002;
    pub const DUPLICATE_IN_PROGRESS: i32 = -3001;
    pub const OPERATION_NOT_FOUND: i32 = -6001;
    pub const INVALID_STATE: i32 = -6002;
    pub const SERVICE_UNAVAILABLE: i32 = -5001;
    pub const INTERNAL_ERROR: i32 = -5002;
}

/// Map an orchestrator error to (http_status, numeric_code, message)
pub fn map_error(e: &OrchestratorError) -> (u16, i32, String) {
    let code = match e.code() {
        "INVALID_AMOUNT" => error_codes::INVALID_AMOUNT,
        "UNSUPPORTED_ASSET" => error_codes::UNSUPPORTED_ASSET,
        "SAME_ADDRESS" => error_codes::SAME_ADDRESS,
        "UNKNOWN_SOURCE" => error_codes::UNKNOWN_SOURCE,
        "INSUFFICIENT_BALANCE" => error_codes::INSUFFICIENT_BALANCE,
        "DUPLICATE_IN_PROGRESS" => error_codes::DUPLICATE_IN_PROGRESS,
        "OPERATION_NOT_FOUND" => error_codes::OPERATION_NOT_FOUND,
        "INVALID_STATE" => error_codes::INVALID_STATE,
        "CLIENT_ERROR" => error_codes::SERVICE_UNAVAILABLE,
        _ => error_codes::INTERNAL_ERROR,
    };

    (e.http_status(), code, e.to_string())
}

// ============================================================================
// Validation helpers
// ============================================================================

fn parse_request(req: &TransferApiRequest) -> Result<TransferRequest, (u16, ApiResponse<()>)> {
    let asset = Asset::parse(&req.asset).ok_or_else(|| {
        (
            400u16,
            ApiResponse::error(
                error_codes::UNSUPPORTED_ASSET,
                format!("Unsupported asset: {}", req.asset),
            ),
        )
    })?;

    let amount = Decimal::from_str(req.amount.trim()).map_err(|_| {
        (
            400u16,
            ApiResponse::error(
                error_codes::INVALID_AMOUNT,
                format!("Invalid amount: {}", req.amount),
            ),
        )
    })?;

    if amount <= Decimal::ZERO {
        return Err((
            400u16,
            ApiResponse::error(
                error_codes::INVALID_AMOUNT,
                "Amount must be greater than zero",
            ),
        ));
    }

    if req.source.trim().is_empty() || req.target.trim().is_empty() {
        return Err((
            400u16,
            ApiResponse::error(
                error_codes::INVALID_PARAMETER,
                "Source and target addresses are required",
            ),
        ));
    }

    Ok(TransferRequest::new(
        req.source.trim(),
        req.target.trim(),
        amount,
        asset,
    ))
}

fn to_api_error(e: &OrchestratorError) -> (u16, ApiResponse<()>) {
    let (status, code, msg) = map_error(e);
    let mut response = ApiResponse::error(code, msg);
    // Duplicates still give the caller an id to poll
    if let OrchestratorError::DuplicateInProgress(id) = e {
        response = response.with_operation_id(*id);
    }
    (status, response)
}

// ============================================================================
// Handlers (called by the route layer)
// ============================================================================

/// Run a transfer saga to completion and return the terminal snapshot
pub async fn submit_transfer(
    orchestrator: &Arc<Orchestrator>,
    req: TransferApiRequest,
) -> Result<OperationApiResponse, (u16, ApiResponse<()>)> {
    let request = parse_request(&req)?;
    let op = orchestrator
        .submit(request)
        .await
        .map_err(|e| to_api_error(&e))?;
    Ok(OperationApiResponse::from(&op))
}

/// Start a transfer saga in the background, returning its id immediately
pub async fn start_transfer(
    orchestrator: &Arc<Orchestrator>,
    req: TransferApiRequest,
) -> Result<StartApiResponse, (u16, ApiResponse<()>)> {
    let request = parse_request(&req)?;
    let id = orchestrator
        .start(request)
        .await
        .map_err(|e| to_api_error(&e))?;
    Ok(StartApiResponse {
        operation_id: id.to_string(),
    })
}

/// Status snapshot for a single operation
pub fn get_operation_status(
    orchestrator: &Arc<Orchestrator>,
    id: &str,
) -> Result<OperationApiResponse, (u16, ApiResponse<()>)> {
    let id = OperationId::from_str(id).map_err(|_| {
        (
            400u16,
            ApiResponse::error(error_codes::INVALID_PARAMETER, "Malformed operation id"),
        )
    })?;

    let op = orchestrator.get_status(id).map_err(|e| to_api_error(&e))?;
    Ok(OperationApiResponse::from(&op))
}

/// All non-terminal operations
pub fn list_pending_operations(
    orchestrator: &Arc<Orchestrator>,
) -> Result<Vec<OperationApiResponse>, (u16, ApiResponse<()>)> {
    let pending = orchestrator.list_pending().map_err(|e| to_api_error(&e))?;
    Ok(pending.iter().map(OperationApiResponse::from).collect())
}

/// Manually re-run recovery for a FAILED operation
pub async fn recover_failed_operation(
    orchestrator: &Arc<Orchestrator>,
    id: &str,
) -> Result<RecoveryApiResponse, (u16, ApiResponse<()>)> {
    let id = OperationId::from_str(id).map_err(|_| {
        (
            400u16,
            ApiResponse::error(error_codes::INVALID_PARAMETER, "Malformed operation id"),
        )
    })?;

    let report = orchestrator
        .recover_failed(id)
        .await
        .map_err(|e| to_api_error(&e))?;
    Ok(RecoveryApiResponse::from(report))
}

/// Apply the retention policy
pub fn cleanup_operations(
    orchestrator: &Arc<Orchestrator>,
) -> Result<CleanupApiResponse, (u16, ApiResponse<()>)> {
    let report = orchestrator.cleanup().map_err(|e| to_api_error(&e))?;
    Ok(CleanupApiResponse::from(report))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(amount: &str, asset: &str) -> TransferApiRequest {
        TransferApiRequest {
            source: "src".to_string(),
            target: "dst".to_string(),
            amount: amount.to_string(),
            asset: asset.to_string(),
        }
    }

    #[test]
    fn test_parse_request_ok() {
        let request = parse_request(&raw("10.5", "usdc")).unwrap();
        assert_eq!(request.amount, Decimal::new(105, 1));
        assert_eq!(request.asset, Asset::Usdc);
        assert_eq!(request.source_address, "src");
    }

    #[test]
    fn test_parse_request_rejects_bad_amount() {
        for bad in ["abc", "", "0", "-1"] {
            let err = parse_request(&raw(bad, "USDC")).unwrap_err();
            assert_eq!(err.0, 400);
            assert_eq!(err.1.code, error_codes::INVALID_AMOUNT);
        }
    }

    #[test]
    fn test_parse_request_rejects_unknown_asset() {
        let err = parse_request(&raw("1", "DOGE")).unwrap_err();
        assert_eq!(err.1.code, error_codes::UNSUPPORTED_ASSET);
    }

    #[test]
    fn test_parse_request_rejects_empty_addresses() {
        let mut req = raw("1", "SOL");
        req.target = "  ".to_string();
        let err = parse_request(&req).unwrap_err();
        assert_eq!(err.1.code, error_codes::INVALID_PARAMETER);
    }

    #[test]
    fn test_duplicate_error_carries_operation_id() {
        let id = OperationId::new();
        let (status, response) = to_api_error(&OrchestratorError::DuplicateInProgress(id));
        assert_eq!(status, 409);
        assert_eq!(response.code, error_codes::DUPLICATE_IN_PROGRESS);
        assert_eq!(response.operation_id, Some(id.to_string()));
    }

    #[test]
    fn test_map_error_codes() {
        let (status, code, _) = map_error(&OrchestratorError::InvalidAmount);
        assert_eq!(status, 400);
        assert_eq!(code, error_codes::INVALID_AMOUNT);

        let (status, code, _) = map_error(&OrchestratorError::OperationNotFound("x".into()));
        assert_eq!(status, 404);
        assert_eq!(code, error_codes::OPERATION_NOT_FOUND);
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::success(StartApiResponse {
            operation_id: "01ARZ".to_string(),
        });
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"code\":0"));
        assert!(json.contains("01ARZ"));
        assert!(!json.contains("\"msg\""));
    }
}
