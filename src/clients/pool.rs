//! Shielded Pool Client
//!
//! REST client for the pool service. Deposit preparation and withdrawals
//! are slow calls (the pool builds proofs server-side), so they get a
//! longer timeout than balance queries.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::operation::Asset;

use super::error::ClientError;
use super::{PoolBalance, PoolClient, PreparedDeposit, TxRef};

/// Configuration for the pool service client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolServiceConfig {
    /// Base URL of the pool service
    pub base_url: String,
    /// Timeout for balance queries (seconds)
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Timeout for proof-building calls: prepare/withdraw (seconds)
    #[serde(default = "default_proof_timeout")]
    pub proof_timeout_secs: u64,
}

fn default_query_timeout() -> u64 {
    15
}

fn default_proof_timeout() -> u64 {
    120
}

impl Default for PoolServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7070".to_string(),
            query_timeout_secs: default_query_timeout(),
            proof_timeout_secs: default_proof_timeout(),
        }
    }
}

/// Error body returned by the pool service
#[derive(Deserialize)]
struct PoolErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct WithdrawResponse {
    tx_ref: String,
}

/// Pool client over HTTP
pub struct HttpPoolClient {
    config: PoolServiceConfig,
    query_client: reqwest::Client,
    proof_client: reqwest::Client,
}

impl HttpPoolClient {
    pub fn new(config: PoolServiceConfig) -> Result<Self, ClientError> {
        let build = |timeout_secs: u64| {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))
        };

        Ok(Self {
            query_client: build(config.query_timeout_secs)?,
            proof_client: build(config.proof_timeout_secs)?,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Decode a pool response, translating error bodies into typed errors
    async fn decode<R>(response: reqwest::Response) -> Result<R, ClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status.as_u16() == 429 {
            return Err(ClientError::RateLimited(format!("pool returned {}", status)));
        }
        if status.is_server_error() {
            return Err(ClientError::Unavailable(format!("pool returned {}", status)));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<PoolErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        debug!(status = status.as_u16(), "Pool rejected request: {}", message);
        Err(ClientError::classify(message))
    }
}

#[async_trait]
impl PoolClient for HttpPoolClient {
    async fn prepare_deposit(
        &self,
        owner: &str,
        amount: Decimal,
        asset: Asset,
    ) -> Result<PreparedDeposit, ClientError> {
        let response = self
            .proof_client
            .post(self.url("deposit/prepare"))
            .json(&json!({
                "owner": owner,
                "amount": amount.to_string(),
                "asset": asset.as_str(),
            }))
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn get_balance(&self, owner: &str, asset: Asset) -> Result<PoolBalance, ClientError> {
        let response = self
            .query_client
            .get(self.url(&format!("balance/{}", owner)))
            .query(&[("asset", asset.as_str())])
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn withdraw(
        &self,
        owner: &str,
        amount: Decimal,
        asset: Asset,
        recipient: &str,
    ) -> Result<TxRef, ClientError> {
        let response = self
            .proof_client
            .post(self.url("withdraw"))
            .json(&json!({
                "owner": owner,
                "amount": amount.to_string(),
                "asset": asset.as_str(),
                "recipient": recipient,
            }))
            .send()
            .await?;

        let body: WithdrawResponse = Self::decode(response).await?;
        Ok(TxRef(body.tx_ref))
    }
}
