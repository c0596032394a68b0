//! Runtime configuration for the sensor bridge.
//! Loaded from a JSON file in the application's config directory; a missing
//! file falls back to defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::utils::ensure_directory_exists;

const CONFIG_FILE_NAME: &str = "sensor_bridge_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long a discovery session listens for advertisements
    pub scan_window_secs: u64,

    /// Upper bound for connect, disconnect, and read operations; a hung
    /// radio call fails the operation instead of hanging the caller
    pub operation_timeout_secs: u64,

    /// Endpoint receiving completed paradigm results
    pub submit_endpoint: String,

    /// Study-assigned identifier stamped on every submission
    pub ambulatory_uuid: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            scan_window_secs: crate::core::bluetooth::DEFAULT_SCAN_WINDOW_SECS,
            operation_timeout_secs: crate::core::bluetooth::DEFAULT_OPERATION_TIMEOUT_SECS,
            submit_endpoint: "http://localhost:3000/submit".to_string(),
            ambulatory_uuid: "dummy".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_window_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    /// Loads the config from a configuration file in `config_dir`
    pub async fn load(config_dir: &Path) -> Result<Self> {
        let file_path = config_dir.join(CONFIG_FILE_NAME);

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(&file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file in `config_dir`
    pub async fn save(&self, config_dir: &Path) -> Result<()> {
        ensure_directory_exists(config_dir).await?;
        let file_path = config_dir.join(CONFIG_FILE_NAME);
        let config_json = serde_json::to_string_pretty(self)?;
        fs::write(&file_path, config_json).await?;
        info!("Config saved to {:?}", file_path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.scan_window_secs, 10);
        assert_eq!(config.operation_timeout_secs, 10);
        assert_eq!(config.submit_endpoint, "http://localhost:3000/submit");
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BridgeConfig::default();
        config.scan_window_secs = 3;
        config.ambulatory_uuid = "participant-17".to_string();
        config.save(dir.path()).await.unwrap();

        let loaded = BridgeConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded.scan_window_secs, 3);
        assert_eq!(loaded.ambulatory_uuid, "participant-17");
    }
}
