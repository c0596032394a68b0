//! Error types for the device-management subsystem

use thiserror::Error;

/// Errors surfaced by device-management operations.
///
/// None of these are fatal to the process: scan/connect/disconnect failures
/// are reported to the user once and the operation may simply be retried.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("Bluetooth permissions were not granted")]
    PermissionDenied,

    #[error("Bluetooth is unavailable: {0}")]
    RadioUnavailable(String),

    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Device not found with ID: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Failed to connect to device {device_id}: {message}")]
    ConnectFailed { device_id: String, message: String },

    #[error("Failed to disconnect from device {device_id}: {message}")]
    DisconnectFailed { device_id: String, message: String },

    #[error("Service discovery failed for device {device_id}: {message}")]
    ServiceDiscoveryFailed { device_id: String, message: String },

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: String },

    #[error("Failed to read characteristic: {0}")]
    ReadFailed(String),

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("An operation is already in progress for device {device_id}")]
    OperationInProgress { device_id: String },

    #[error("Operation timed out after {secs} seconds")]
    Timeout { secs: u64 },

    #[error("The device-management subsystem has been shut down")]
    SubsystemClosed,
}
