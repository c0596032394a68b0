//! Bluetooth manager for the wearable sensor bridge.
//!
//! This is the surface the device screens talk to. The manager is an
//! explicit subsystem instance owned by the application's composition root;
//! it is created once, passed by reference to consumers, and torn down
//! exactly once with [`BluetoothManager::shutdown`]. It never revives itself
//! after teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::core::bluetooth::backend::{BluestBackend, RadioBackend};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::error::BridgeError;
use crate::core::bluetooth::events::{AdvisoryLog, DeviceEvent, EventChannel};
use crate::core::bluetooth::notification::{NotificationBridge, NotificationSubscription};
use crate::core::bluetooth::registry::DeviceRegistry;
use crate::core::bluetooth::scanner::DiscoverySession;
use crate::core::bluetooth::types::SensorDevice;
use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;

/// Manages discovery, connection, and notification flow for sensor devices
pub struct BluetoothManager {
    registry: Arc<DeviceRegistry>,
    events: EventChannel,
    advisories: Arc<AdvisoryLog>,
    discovery: DiscoverySession,
    connections: ConnectionManager,
    notifications: NotificationBridge,
    closed: AtomicBool,
}

impl BluetoothManager {
    /// Creates the manager over the system's default Bluetooth adapter
    pub async fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let backend = Arc::new(BluestBackend::new().await?);
        info!("Bluetooth adapter handle created");
        Ok(Self::with_backend(backend, config))
    }

    /// Creates the manager over an explicit radio backend
    pub fn with_backend(backend: Arc<dyn RadioBackend>, config: &BridgeConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let events = EventChannel::new(EVENT_CHANNEL_CAPACITY);
        let advisories = Arc::new(AdvisoryLog::new());

        let discovery = DiscoverySession::new(
            backend.clone(),
            registry.clone(),
            events.clone(),
            advisories.clone(),
            config.scan_window(),
        );
        let connections = ConnectionManager::new(
            backend.clone(),
            registry.clone(),
            events.clone(),
            advisories.clone(),
            config.operation_timeout(),
        );
        let notifications = NotificationBridge::new(backend);

        Self {
            registry,
            events,
            advisories,
            discovery,
            connections,
            notifications,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BridgeError::SubsystemClosed)
        } else {
            Ok(())
        }
    }

    /// Starts a time-boxed discovery session
    pub async fn scan_for_devices(&self) -> Result<(), BridgeError> {
        self.ensure_open()?;
        self.discovery.start_discovery().await
    }

    /// Stops the discovery session early, if one is running
    pub async fn stop_scan(&self) {
        self.discovery.stop_discovery().await;
    }

    pub fn is_scanning(&self) -> bool {
        self.discovery.is_scanning()
    }

    /// Snapshot of devices seen during the current discovery session
    pub fn available_devices(&self) -> Vec<SensorDevice> {
        self.registry.available_devices()
    }

    /// Snapshot of currently connected devices
    pub fn connected_devices(&self) -> Vec<SensorDevice> {
        self.registry.connected_devices()
    }

    /// Connects to a device by id. Returns `true` on success.
    pub async fn connect_to_device(&self, device_id: &str) -> bool {
        if let Err(e) = self.ensure_open() {
            self.advisories.record(&e);
            return false;
        }
        self.connections.connect(device_id).await
    }

    /// Disconnects a device by id. Returns `true` on success.
    pub async fn disconnect_device(&self, device_id: &str) -> bool {
        if let Err(e) = self.ensure_open() {
            self.advisories.record(&e);
            return false;
        }
        self.connections.disconnect(device_id).await
    }

    /// Subscribes to value updates on a characteristic of a connected device
    pub async fn subscribe_to_notifications(
        &self,
        device_id: &str,
        characteristic: Uuid,
        on_data: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<NotificationSubscription, BridgeError> {
        self.ensure_open()?;
        self.notifications
            .subscribe(device_id, characteristic, on_data)
            .await
    }

    /// Placeholder for on-device recording control; the firmware side is not
    /// implemented yet, so this only acknowledges the request.
    pub fn start_recording(&self, device_id: &str) {
        info!("Recording started for device ID: {}", device_id);
    }

    /// Attaches an observer to registry-change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Removes and returns the pending user-facing advisories, oldest first
    pub fn drain_advisories(&self) -> Vec<String> {
        self.advisories.drain()
    }

    /// Tears the subsystem down: stops any scan and refuses all further
    /// operations. Idempotent; the radio handle is released when the manager
    /// is dropped, never re-created.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            warn!("Shutdown called twice, ignoring");
            return;
        }
        self.discovery.stop_discovery().await;
        let listeners = self.events.subscriber_count();
        if listeners > 0 {
            warn!(
                "Shut down with {} event subscriber(s) still attached",
                listeners
            );
        }
        info!("Device-management subsystem shut down");
    }
}
