//! Defines shared data structures for the Bluetooth module.

use serde::{Serialize, Serializer};

/// Battery charge of a sensor unit, as reported by its battery characteristic.
///
/// Units that do not expose a readable battery characteristic report
/// `Unknown`, which serializes as the `"N/A"` sentinel the UI expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryLevel {
    /// Charge percentage, 0-100
    Percent(u8),
    /// The unit did not report a battery level
    Unknown,
}

impl Serialize for BatteryLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BatteryLevel::Percent(p) => serializer.serialize_u8(*p),
            BatteryLevel::Unknown => serializer.serialize_str("N/A"),
        }
    }
}

impl std::fmt::Display for BatteryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryLevel::Percent(p) => write!(f, "{}%", p),
            BatteryLevel::Unknown => write!(f, "N/A"),
        }
    }
}

/// Represents one wearable sensor unit as seen by the UI layer
#[derive(Debug, Clone, Serialize)]
pub struct SensorDevice {
    /// Platform-specific unique identifier for the device (stable radio address/UUID)
    pub id: String,
    /// The name of the device, if advertised
    pub name: Option<String>,
    /// The signal strength (RSSI) at discovery time, if reported
    pub rssi: Option<i16>,
    /// The battery level read during the connect handshake
    pub battery_level: BatteryLevel,
    /// Bytes of recorded sensor data not yet synced off the unit (informational stub)
    pub unsynced_data_size: u64,
}

impl SensorDevice {
    /// Creates a record for a device seen during discovery, before any connection
    pub fn discovered(id: String, name: Option<String>, rssi: Option<i16>) -> Self {
        Self {
            id,
            name,
            rssi,
            battery_level: BatteryLevel::Unknown,
            unsynced_data_size: 0,
        }
    }

    /// Display name falling back to a placeholder for unnamed units
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Device")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_level_serializes_percent_as_number() {
        let json = serde_json::to_string(&BatteryLevel::Percent(87)).unwrap();
        assert_eq!(json, "87");
    }

    #[test]
    fn battery_level_serializes_unknown_as_sentinel() {
        let json = serde_json::to_string(&BatteryLevel::Unknown).unwrap();
        assert_eq!(json, "\"N/A\"");
    }

    #[test]
    fn discovered_device_starts_without_battery_info() {
        let dev = SensorDevice::discovered("AA:BB".into(), None, Some(-60));
        assert_eq!(dev.battery_level, BatteryLevel::Unknown);
        assert_eq!(dev.unsynced_data_size, 0);
        assert_eq!(dev.display_name(), "Unnamed Device");
    }
}
