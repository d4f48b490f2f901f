use serde::{Deserialize, Serialize};
use std::fs;

use crate::clients::ledger::LedgerConfig;
use crate::clients::pool::PoolServiceConfig;
use crate::clients::signer::SignerConfig;
use crate::operation::OrchestratorConfig;
use crate::operation::worker::WorkerConfig;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// Directory the operation store writes its snapshot files into
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub ledger: LedgerConfig,
    pub pool: PoolServiceConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn default_data_dir() -> String {
    "./data/operations".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", config_path, e))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", config_path, e))?;
        Ok(config)
    }
}
