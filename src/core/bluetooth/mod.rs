//! Bluetooth functionality for the wearable sensor bridge.
//! This module handles all device-management operations: discovering,
//! connecting to, and receiving data from wearable sensor units.

pub mod backend;
mod connection;
mod constants;
mod error;
mod events;
mod manager;
mod notification;
mod permissions;
mod registry;
mod scanner;
mod types;

// Re-export types that should be publicly accessible
pub use backend::{Advertisement, BluestBackend, PeripheralLink, RadioBackend, ServiceInfo};
pub use connection::{read_battery, ConnectionManager};
pub use constants::*; // Re-export all constants
pub use error::BridgeError;
pub use events::{AdvisoryLog, DeviceEvent, EventChannel};
pub use manager::BluetoothManager;
pub use notification::{NotificationBridge, NotificationSubscription};
pub use permissions::PermissionGate;
pub use registry::DeviceRegistry;
pub use scanner::DiscoverySession;
pub use types::{BatteryLevel, SensorDevice};
