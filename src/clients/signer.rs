//! Remote Signer Client
//!
//! Key custody lives in a separate signer service; this process only asks
//! "can you sign for this address" and "sign this payload".

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::error::ClientError;
use super::{KeyProvider, SignedTx, UnsignedTx};

/// Configuration for the signer service client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the signer service
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    15
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:7071".to_string(),
            request_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Deserialize)]
struct SignResponse {
    payload: String,
}

/// Key provider backed by the external signer service
pub struct HttpSignerClient {
    config: SignerConfig,
    client: reqwest::Client,
}

impl HttpSignerClient {
    pub fn new(config: SignerConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl KeyProvider for HttpSignerClient {
    async fn can_sign(&self, address: &str) -> bool {
        let result = self
            .client
            .get(self.url(&format!("keys/{}", address)))
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(address, "Signer key lookup failed: {}", e);
                false
            }
        }
    }

    async fn sign(&self, address: &str, tx: &UnsignedTx) -> Result<SignedTx, ClientError> {
        let response = self
            .client
            .post(self.url("sign"))
            .json(&json!({
                "address": address,
                "payload": tx.payload,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected(format!(
                "signer returned {}: {}",
                status, body
            )));
        }

        let body: SignResponse = response.json().await?;
        Ok(SignedTx {
            payload: body.payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SignerConfig::default();
        assert_eq!(config.request_timeout_secs, 15);
    }
}
