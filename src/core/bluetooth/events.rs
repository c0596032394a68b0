//! Event channel for the device-management subsystem
//! Observers (the UI layer) subscribe here instead of polling or mirroring
//! registry state.

use std::sync::Mutex;

use log::{error, warn};
use tokio::sync::broadcast;

use crate::core::bluetooth::error::BridgeError;
use crate::core::bluetooth::types::SensorDevice;

/// Events published while the subsystem mutates the device registry
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A discovery session started listening for advertisements
    ScanStarted,
    /// A device was seen for the first time in the current session
    DeviceDiscovered(SensorDevice),
    /// The discovery window elapsed or the session was stopped
    ScanFinished,
    /// A connect handshake completed and the device joined the connected set
    DeviceConnected(SensorDevice),
    /// A device left the connected set
    DeviceDisconnected { device_id: String },
}

/// Typed publish/subscribe bus scoped to the life of the subsystem.
///
/// Publishing with no subscribers is a no-op; subscribers attach and detach
/// without affecting publishers.
#[derive(Clone)]
pub struct EventChannel {
    tx: broadcast::Sender<DeviceEvent>,
}

impl EventChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Delivers an event to every current subscriber
    pub fn publish(&self, event: DeviceEvent) {
        // send only errors when there are no receivers, which is fine
        let _ = self.tx.send(event);
    }

    /// Attaches a new subscriber receiving all events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers, reported by teardown diagnostics
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// User-facing error advisories.
///
/// Stands in for the mobile shell's alert dialogs: scan, connect, and
/// disconnect failures are recorded here exactly once per attempt and the UI
/// drains them. Battery-read and notification failures are never recorded.
#[derive(Default)]
pub struct AdvisoryLog {
    entries: Mutex<Vec<String>>,
}

impl AdvisoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an advisory and logs it
    pub fn record(&self, error: &BridgeError) {
        error!("{}", error);
        match self.entries.lock() {
            Ok(mut entries) => entries.push(error.to_string()),
            Err(poisoned) => {
                warn!("advisory log mutex poisoned, recovering");
                poisoned.into_inner().push(error.to_string());
            }
        }
    }

    /// Removes and returns all pending advisories, oldest first
    pub fn drain(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(mut entries) => std::mem::take(&mut *entries),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Number of advisories recorded and not yet drained
    pub fn pending(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
