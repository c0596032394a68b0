//! Connect/disconnect lifecycle for sensor devices.
//!
//! Each connect drives the handshake through its phases (open link, discover
//! services, read battery) and promotes the device into the registry's
//! connected set. In-flight operations are tracked per device id, so a stuck
//! teardown on one unit never blocks another, while duplicate requests for
//! the same unit are refused immediately.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};

use crate::core::bluetooth::backend::{PeripheralLink, RadioBackend};
use crate::core::bluetooth::constants::{UUID_BATTERY_LEVEL_CHAR, UUID_SENSOR_SERVICE};
use crate::core::bluetooth::error::BridgeError;
use crate::core::bluetooth::events::{AdvisoryLog, DeviceEvent, EventChannel};
use crate::core::bluetooth::registry::DeviceRegistry;
use crate::core::bluetooth::types::{BatteryLevel, SensorDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OpKind {
    Connect,
    Disconnect,
}

pub struct ConnectionManager {
    backend: Arc<dyn RadioBackend>,
    registry: Arc<DeviceRegistry>,
    events: EventChannel,
    advisories: Arc<AdvisoryLog>,
    operation_timeout: Duration,
    in_flight: Mutex<HashSet<(String, OpKind)>>,
}

/// Releases the per-device in-flight marker when the operation finishes,
/// on success and failure alike
struct OpGuard<'a> {
    manager: &'a ConnectionManager,
    key: (String, OpKind),
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.manager
            .in_flight
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.key);
    }
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn RadioBackend>,
        registry: Arc<DeviceRegistry>,
        events: EventChannel,
        advisories: Arc<AdvisoryLog>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            registry,
            events,
            advisories,
            operation_timeout,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn begin(&self, device_id: &str, kind: OpKind) -> Result<OpGuard<'_>, BridgeError> {
        let key = (device_id.to_string(), kind);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !in_flight.insert(key.clone()) {
            return Err(BridgeError::OperationInProgress {
                device_id: device_id.to_string(),
            });
        }
        Ok(OpGuard { manager: self, key })
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, BridgeError>>,
    ) -> Result<T, BridgeError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                secs: self.operation_timeout.as_secs(),
            }),
        }
    }

    /// Connects to a device, reads its battery level, and adds it to the
    /// connected set.
    ///
    /// Returns `false` on any failure, leaving the connected set unmodified
    /// and recording one user-facing advisory. A connect already in flight
    /// for the same id is refused immediately.
    pub async fn connect(&self, device_id: &str) -> bool {
        let _guard = match self.begin(device_id, OpKind::Connect) {
            Ok(guard) => guard,
            Err(e) => {
                self.advisories.record(&e);
                return false;
            }
        };

        info!("Connecting to device: {}", device_id);
        match self.try_connect(device_id).await {
            Ok(device) => {
                info!(
                    "Connected to device: {} (battery {})",
                    device.display_name(),
                    device.battery_level
                );
                self.events.publish(DeviceEvent::DeviceConnected(device));
                true
            }
            Err(e) => {
                self.advisories.record(&e);
                false
            }
        }
    }

    async fn try_connect(&self, device_id: &str) -> Result<SensorDevice, BridgeError> {
        let link = self.with_timeout(self.backend.connect(device_id)).await?;
        let battery_level = self.read_battery_bounded(link.as_ref()).await;

        // fill in what the connect handshake does not report from the
        // advertisement seen during discovery
        let advertised = self
            .registry
            .available_devices()
            .into_iter()
            .find(|d| d.id == device_id);
        let name = link
            .name()
            .or_else(|| advertised.as_ref().and_then(|d| d.name.clone()));
        let rssi = advertised.as_ref().and_then(|d| d.rssi);

        let device = SensorDevice {
            id: device_id.to_string(),
            name,
            rssi,
            battery_level,
            unsynced_data_size: 0,
        };
        // a repeat connect for an already-connected id refreshes the record
        // instead of appending a duplicate
        self.registry.upsert_connected(device.clone());
        Ok(device)
    }

    /// Bounds the battery read without failing the connect; a stalled read
    /// degrades to `Unknown` like every other battery failure
    async fn read_battery_bounded(&self, link: &dyn PeripheralLink) -> BatteryLevel {
        match tokio::time::timeout(self.operation_timeout, read_battery(link)).await {
            Ok(level) => level,
            Err(_) => {
                debug!(
                    "Battery read timed out after {:?}, reporting unknown",
                    self.operation_timeout
                );
                BatteryLevel::Unknown
            }
        }
    }

    /// Tears down the connection to a device and removes it from the
    /// connected set.
    ///
    /// Returns `false` if the device is not connected, if a disconnect for
    /// this id is already in flight, or if the teardown fails; the connected
    /// set is left unchanged on every failure path.
    pub async fn disconnect(&self, device_id: &str) -> bool {
        if !self.registry.is_connected(device_id) {
            self.advisories.record(&BridgeError::DeviceNotFound {
                device_id: device_id.to_string(),
            });
            return false;
        }

        let _guard = match self.begin(device_id, OpKind::Disconnect) {
            Ok(guard) => guard,
            Err(e) => {
                self.advisories.record(&e);
                return false;
            }
        };

        info!("Disconnecting device: {}", device_id);
        match self.with_timeout(self.backend.disconnect(device_id)).await {
            Ok(()) => {
                self.registry.remove_connected(device_id);
                self.events.publish(DeviceEvent::DeviceDisconnected {
                    device_id: device_id.to_string(),
                });
                info!("Disconnected from device: {}", device_id);
                true
            }
            Err(e) => {
                self.advisories.record(&e);
                false
            }
        }
    }
}

/// Reads the battery-level characteristic from a connected link.
///
/// Looks up the sensor service and its battery characteristic by UUID and
/// interprets the first byte of the value as a percentage. Every failure in
/// the sequence degrades to [`BatteryLevel::Unknown`]; this read never
/// surfaces an error to the caller.
pub async fn read_battery(link: &dyn PeripheralLink) -> BatteryLevel {
    let services = match link.services().await {
        Ok(services) => services,
        Err(e) => {
            debug!("Battery read skipped, service discovery failed: {}", e);
            return BatteryLevel::Unknown;
        }
    };

    let Some(service) = services.iter().find(|s| s.uuid == UUID_SENSOR_SERVICE) else {
        debug!("Battery service not found");
        return BatteryLevel::Unknown;
    };
    if !service.characteristics.contains(&UUID_BATTERY_LEVEL_CHAR) {
        debug!("Battery characteristic not found");
        return BatteryLevel::Unknown;
    }

    match link
        .read_characteristic(service.uuid, UUID_BATTERY_LEVEL_CHAR)
        .await
    {
        Ok(bytes) if !bytes.is_empty() => BatteryLevel::Percent(bytes[0]),
        Ok(_) => {
            debug!("Battery read returned no data");
            BatteryLevel::Unknown
        }
        Err(e) => {
            debug!("Battery read failed: {}", e);
            BatteryLevel::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::backend::mock::{MockBackend, MockPeripheral};
    use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn sensor_unit(id: &str) -> MockPeripheral {
        MockPeripheral::new(id, Some("wearable"))
            .with_service(UUID_SENSOR_SERVICE, &[UUID_BATTERY_LEVEL_CHAR])
            .with_value(UUID_BATTERY_LEVEL_CHAR, &[77])
    }

    fn manager(backend: Arc<MockBackend>) -> ConnectionManager {
        ConnectionManager::new(
            backend,
            Arc::new(DeviceRegistry::new()),
            EventChannel::new(EVENT_CHANNEL_CAPACITY),
            Arc::new(AdvisoryLog::new()),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn connect_then_disconnect_round_trip() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("X"));
        let manager = manager(backend);
        let mut rx = manager.events.subscribe();

        assert!(manager.connect("X").await);
        let connected = manager.registry.connected_devices();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].battery_level, BatteryLevel::Percent(77));
        assert!(matches!(
            rx.recv().await.unwrap(),
            DeviceEvent::DeviceConnected(_)
        ));

        assert!(manager.disconnect("X").await);
        assert!(manager.registry.connected_devices().is_empty());
        assert!(matches!(
            rx.recv().await.unwrap(),
            DeviceEvent::DeviceDisconnected { .. }
        ));
        assert_eq!(manager.advisories.pending(), 0);
    }

    #[tokio::test]
    async fn stalled_battery_read_still_completes_the_connect() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("S").slow_service_discovery(Duration::from_millis(200)));
        let mut manager = manager(backend.clone());
        manager.operation_timeout = Duration::from_millis(20);

        // the stalled read degrades to Unknown instead of failing the connect
        assert!(manager.connect("S").await);
        let connected = manager.registry.connected_devices();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].battery_level, BatteryLevel::Unknown);
        assert!(backend.is_link_open("S"));
        assert_eq!(manager.advisories.pending(), 0);
    }

    #[tokio::test]
    async fn connect_without_battery_service_degrades_to_unknown() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(
            MockPeripheral::new("X", Some("wearable"))
                .with_service(Uuid::from_u128(0xdead), &[Uuid::from_u128(0xbeef)]),
        );
        let manager = manager(backend);

        assert!(manager.connect("X").await);
        let connected = manager.registry.connected_devices();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].battery_level, BatteryLevel::Unknown);
        assert_eq!(manager.advisories.pending(), 0);
    }

    #[tokio::test]
    async fn failed_handshake_leaves_connected_set_unchanged() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("Y").failing_connect("refused"));
        let manager = manager(backend);

        assert!(!manager.connect("Y").await);
        assert!(manager.registry.connected_devices().is_empty());
        assert_eq!(manager.advisories.pending(), 1);
    }

    #[tokio::test]
    async fn disconnect_of_unknown_device_is_refused() {
        let backend = Arc::new(MockBackend::new());
        let manager = manager(backend.clone());

        assert!(!manager.disconnect("ghost").await);
        assert_eq!(manager.advisories.pending(), 1);
        assert_eq!(backend.disconnect_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disconnects_for_different_devices_run_concurrently() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("A").slow_disconnect(Duration::from_millis(50)));
        backend.add_peripheral(sensor_unit("B").slow_disconnect(Duration::from_millis(50)));
        let manager = manager(backend);
        assert!(manager.connect("A").await);
        assert!(manager.connect("B").await);

        let (a, b) = tokio::join!(manager.disconnect("A"), manager.disconnect("B"));
        assert!(a);
        assert!(b);
        assert!(manager.registry.connected_devices().is_empty());
    }

    #[tokio::test]
    async fn concurrent_disconnects_for_same_device_are_serialized() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("A").slow_disconnect(Duration::from_millis(100)));
        let manager = manager(backend);
        assert!(manager.connect("A").await);

        let (first, second) = tokio::join!(manager.disconnect("A"), manager.disconnect("A"));
        // one teardown wins, the duplicate is refused without touching state
        assert!(first ^ second);
        assert!(manager.registry.connected_devices().is_empty());
        assert_eq!(manager.advisories.pending(), 1);
    }

    #[tokio::test]
    async fn failed_teardown_keeps_device_connected() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("A").failing_disconnect("link busy"));
        let manager = manager(backend);
        assert!(manager.connect("A").await);

        assert!(!manager.disconnect("A").await);
        assert!(manager.registry.is_connected("A"));
        assert_eq!(manager.advisories.pending(), 1);

        // the guard was released, so the user may retry immediately
        assert!(!manager.disconnect("A").await);
        assert_eq!(manager.advisories.pending(), 2);
    }

    #[tokio::test]
    async fn slow_teardown_times_out() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("A").slow_disconnect(Duration::from_millis(200)));
        let mut manager = manager(backend);
        manager.operation_timeout = Duration::from_millis(20);
        assert!(manager.connect("A").await);

        assert!(!manager.disconnect("A").await);
        assert!(manager.registry.is_connected("A"));
        let advisories = manager.advisories.drain();
        assert!(advisories[0].contains("timed out"));
    }

    #[tokio::test]
    async fn repeat_connect_updates_record_in_place() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(sensor_unit("X"));
        let manager = manager(backend);

        assert!(manager.connect("X").await);
        assert!(manager.connect("X").await);
        assert_eq!(manager.registry.connected_devices().len(), 1);
    }

    #[tokio::test]
    async fn read_battery_absorbs_every_failure() {
        let no_service = MockPeripheral::new("A", None);
        assert_eq!(read_battery(&no_service).await, BatteryLevel::Unknown);

        let discovery_fails = MockPeripheral::new("B", None).failing_service_discovery("gatt error");
        assert_eq!(read_battery(&discovery_fails).await, BatteryLevel::Unknown);

        let no_value = MockPeripheral::new("C", None)
            .with_service(UUID_SENSOR_SERVICE, &[UUID_BATTERY_LEVEL_CHAR]);
        assert_eq!(read_battery(&no_value).await, BatteryLevel::Unknown);

        let empty_value = MockPeripheral::new("D", None)
            .with_service(UUID_SENSOR_SERVICE, &[UUID_BATTERY_LEVEL_CHAR])
            .with_value(UUID_BATTERY_LEVEL_CHAR, &[]);
        assert_eq!(read_battery(&empty_value).await, BatteryLevel::Unknown);

        let healthy = sensor_unit("E");
        assert_eq!(read_battery(&healthy).await, BatteryLevel::Percent(77));
    }
}
