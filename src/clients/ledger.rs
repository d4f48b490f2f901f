//! Ledger RPC Client
//!
//! JSON-RPC client for the ledger node: balance queries, transaction
//! submission, and bounded confirmation waits.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::operation::Asset;

use super::error::ClientError;
use super::{LedgerClient, SignedTx, TxRef};

/// Configuration for the ledger RPC client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Total budget for a confirmation wait (seconds)
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
    /// Delay between confirmation status checks (seconds)
    #[serde(default = "default_confirm_poll")]
    pub confirm_poll_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_confirm_timeout() -> u64 {
    90
}

fn default_confirm_poll() -> u64 {
    2
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8899".to_string(),
            request_timeout_secs: default_request_timeout(),
            confirm_timeout_secs: default_confirm_timeout(),
            confirm_poll_secs: default_confirm_poll(),
        }
    }
}

/// JSON-RPC request structure
#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct BalanceResult {
    /// Decimal string, already scaled to whole units of the asset
    amount: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxStatusResult {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Ledger client over JSON-RPC
pub struct HttpLedgerClient {
    config: LedgerConfig,
    client: reqwest::Client,
}

impl HttpLedgerClient {
    pub fn new(config: LedgerConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<R, ClientError>
    where
        T: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response: JsonRpcResponse<R> = self
            .client
            .post(&self.config.rpc_url)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            debug!(method, code = err.code, "RPC error: {}", err.message);
            return Err(ClientError::classify(err.message));
        }

        response
            .result
            .ok_or_else(|| ClientError::BadResponse(format!("{}: empty result", method)))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_balance(&self, address: &str, asset: Asset) -> Result<Decimal, ClientError> {
        let result: BalanceResult = self
            .rpc_call("getBalance", json!([address, asset.as_str()]))
            .await?;

        result
            .amount
            .parse()
            .map_err(|e| ClientError::BadResponse(format!("balance '{}': {}", result.amount, e)))
    }

    async fn submit(&self, tx: &SignedTx) -> Result<TxRef, ClientError> {
        let reference: String = self
            .rpc_call("sendTransaction", json!([tx.payload]))
            .await?;
        Ok(TxRef(reference))
    }

    async fn confirm(&self, tx_ref: &TxRef) -> Result<(), ClientError> {
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.confirm_timeout_secs);
        let poll_delay = Duration::from_secs(self.config.confirm_poll_secs);

        loop {
            let result: Result<TxStatusResult, ClientError> = self
                .rpc_call("getTransactionStatus", json!([tx_ref.as_str()]))
                .await;

            match result {
                Ok(status) => match status.status.as_str() {
                    "confirmed" | "finalized" => return Ok(()),
                    "failed" => {
                        let detail = status.error.unwrap_or_else(|| "unknown".to_string());
                        warn!(tx_ref = %tx_ref, "Transaction failed on ledger: {}", detail);
                        return Err(ClientError::classify(detail));
                    }
                    // "pending" / "processed" - keep waiting
                    _ => {}
                },
                // A dropped connection looks the same as the transaction
                // not being visible yet; only the deadline gives up
                Err(e) if e.is_recoverable() => {
                    warn!(tx_ref = %tx_ref, "Confirmation poll failed: {}", e);
                }
                Err(e) => return Err(e),
            }

            if tokio::time::Instant::now() + poll_delay > deadline {
                return Err(ClientError::ConfirmationTimeout(format!(
                    "{} not confirmed within {}s",
                    tx_ref, self.config.confirm_timeout_secs
                )));
            }
            tokio::time::sleep(poll_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.confirm_timeout_secs, 90);
        assert_eq!(config.confirm_poll_secs, 2);
    }

    #[test]
    fn test_config_deserializes_partial_yaml() {
        let config: LedgerConfig =
            serde_yaml::from_str("rpc_url: http://node:8899\n").unwrap();
        assert_eq!(config.rpc_url, "http://node:8899");
        assert_eq!(config.confirm_timeout_secs, 90);
    }

    /// RPC stub that drops the first connection, then answers every poll
    /// with a confirmed transaction status.
    async fn flaky_confirmed_stub() -> std::net::SocketAddr {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First poll dies mid-connection
            if let Ok((first, _)) = listener.accept().await {
                drop(first);
            }

            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf).await;

                let body = r#"{"jsonrpc":"2.0","result":{"status":"confirmed"},"id":1}"#;
                let response = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_confirm_survives_transient_poll_failure() {
        let addr = flaky_confirmed_stub().await;

        let client = HttpLedgerClient::new(LedgerConfig {
            rpc_url: format!("http://{}", addr),
            request_timeout_secs: 5,
            confirm_timeout_secs: 10,
            confirm_poll_secs: 1,
        })
        .unwrap();

        // The dropped connection consumes one poll; the next one confirms
        client.confirm(&TxRef("sig-1".to_string())).await.unwrap();
    }
}
