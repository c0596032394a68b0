//! Process-wide registry of available and connected sensor devices.
//!
//! The registry is the single source of truth for device state. It is owned
//! by the device-management subsystem; outside components only ever see
//! snapshots or events, never the live collections.

use std::sync::Mutex;

use crate::core::bluetooth::types::SensorDevice;

/// Holds the two logical device sets, keyed by device id.
///
/// `available` is populated only during an active discovery session and
/// preserves arrival order. `connected` holds one entry per id that completed
/// a connect handshake and has not since disconnected. An id may appear in
/// both sets at once; a connected device that is still advertising shows up
/// redundantly in `available`, matching the shipped product behavior.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: Mutex<Sets>,
}

#[derive(Default)]
struct Sets {
    available: Vec<SensorDevice>,
    connected: Vec<SensorDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sets> {
        // no await points while held, so poisoning only follows a panic
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Empties the available set at the start of a discovery session
    pub fn clear_available(&self) {
        self.lock().available.clear();
    }

    /// Inserts a newly discovered device, keeping the first-seen entry when
    /// the same id is reported again. Returns true if the device was new.
    pub fn insert_available(&self, device: SensorDevice) -> bool {
        let mut sets = self.lock();
        if sets.available.iter().any(|d| d.id == device.id) {
            return false;
        }
        sets.available.push(device);
        true
    }

    /// Adds a device to the connected set, or refreshes the existing entry
    /// when the same id connects again
    pub fn upsert_connected(&self, device: SensorDevice) {
        let mut sets = self.lock();
        if let Some(existing) = sets.connected.iter_mut().find(|d| d.id == device.id) {
            *existing = device;
        } else {
            sets.connected.push(device);
        }
    }

    /// Removes a device from the connected set. Returns true if it was present.
    pub fn remove_connected(&self, device_id: &str) -> bool {
        let mut sets = self.lock();
        let before = sets.connected.len();
        sets.connected.retain(|d| d.id != device_id);
        sets.connected.len() != before
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.lock().connected.iter().any(|d| d.id == device_id)
    }

    /// Read-only snapshot of the available set, in arrival order
    pub fn available_devices(&self) -> Vec<SensorDevice> {
        self.lock().available.clone()
    }

    /// Read-only snapshot of the connected set
    pub fn connected_devices(&self) -> Vec<SensorDevice> {
        self.lock().connected.clone()
    }
}
