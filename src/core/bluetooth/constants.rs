//! Constants used throughout the device-management subsystem
//! This module contains all the constant values used when talking to the
//! wearable sensor units, such as UUIDs, timeouts, and other configuration values.

use uuid::Uuid;

/// The UUID of the wearable sensor's primary service
pub const UUID_SENSOR_SERVICE: Uuid = Uuid::from_u128(0xa0a43180_96be_4222_b41e_98ea76b0120c);

/// The UUID of the battery-level characteristic on the sensor service
pub const UUID_BATTERY_LEVEL_CHAR: Uuid = Uuid::from_u128(0xa0a43197_96be_4222_b41e_98ea76b0120c);

/// The UUID of the sensor-enable switch characteristic
pub const UUID_SENSOR_SWITCH_CHAR: Uuid = Uuid::from_u128(0xa0a43193_96be_4222_b41e_98ea76b0120c);

/// The UUID of the data-read characteristic
pub const UUID_READ_DATA_CHAR: Uuid = Uuid::from_u128(0xa0a4319f_96be_4222_b41e_98ea76b0120c);

/// Standard Bluetooth Battery Service UUID (kept for units that expose
/// the SIG battery service instead of the vendor one)
pub const UUID_STANDARD_BATTERY_SERVICE: Uuid =
    Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Battery Level Characteristic UUID
pub const UUID_STANDARD_BATTERY_LEVEL: Uuid =
    Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Scan window duration in seconds
pub const DEFAULT_SCAN_WINDOW_SECS: u64 = 10;

/// Timeout for connect/disconnect/read operations in seconds
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Capacity of the device-event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;
