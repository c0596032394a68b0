//! Wearable sensor bridge library
//! Device discovery, pairing, and result submission for the ambulatory
//! testing application.

// Module declarations
pub mod config;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;

// Re-export the main surface
pub use config::BridgeConfig;
pub use self::core::bluetooth::{BatteryLevel, BluetoothManager, DeviceEvent, SensorDevice};
pub use state::AppState;
