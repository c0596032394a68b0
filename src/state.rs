//! Application state management
//! This module defines the composition root that owns the device-management
//! subsystem and the result-submission sink.

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::config::BridgeConfig;
use crate::core::submission::{HttpResultSink, ResultSink};
use crate::core::BluetoothManager;

/// Global application state
pub struct AppState {
    /// The Bluetooth manager instance; consumers receive it by reference
    bluetooth_manager: Arc<BluetoothManager>,
    /// Where paradigm screens send their collected answers
    result_sink: Arc<dyn ResultSink>,
    pub config: BridgeConfig,
}

impl AppState {
    /// Creates a new AppState instance over the system Bluetooth adapter
    pub async fn new(config: BridgeConfig) -> Result<Self> {
        info!("Initializing BluetoothManager...");
        let manager = BluetoothManager::new(&config).await?;
        let result_sink = Arc::new(HttpResultSink::new(config.submit_endpoint.clone()));
        Ok(Self {
            bluetooth_manager: Arc::new(manager),
            result_sink,
            config,
        })
    }

    pub fn bluetooth_manager(&self) -> Arc<BluetoothManager> {
        self.bluetooth_manager.clone()
    }

    pub fn result_sink(&self) -> Arc<dyn ResultSink> {
        self.result_sink.clone()
    }

    /// Explicit lifecycle end: shuts the device subsystem down exactly once
    pub async fn teardown(&self) {
        self.bluetooth_manager.shutdown().await;
    }
}
