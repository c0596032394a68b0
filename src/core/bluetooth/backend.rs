//! Radio-stack seam for the device-management subsystem.
//!
//! All bluest access goes through the [`RadioBackend`] and [`PeripheralLink`]
//! traits so the discovery and connection logic can be exercised against a
//! scripted backend in tests. [`BluestBackend`] is the production
//! implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Device};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::error::BridgeError;

/// One advertisement seen during a scan
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub id: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

/// Service metadata discovered on a connected peripheral
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

/// Stream of advertisements; an `Err` item aborts the discovery session
pub type ScanStream = BoxStream<'static, Result<Advertisement, BridgeError>>;

/// Stream of characteristic value updates
pub type NotifyStream = BoxStream<'static, Result<Vec<u8>, BridgeError>>;

/// Entry point into the radio stack.
///
/// The handle is created once by the subsystem and released exactly once on
/// teardown; it is never re-created implicitly.
#[async_trait]
pub trait RadioBackend: Send + Sync {
    /// Checks that the radio is powered and usable. Maps to the runtime
    /// permission/power gate on platforms that need one.
    async fn ensure_ready(&self) -> Result<(), BridgeError>;

    /// Starts a scan and returns the advertisement stream. Scanning stops
    /// when the stream is dropped.
    async fn scan(&self) -> Result<ScanStream, BridgeError>;

    /// Opens a connection to a previously discovered device
    async fn connect(&self, device_id: &str) -> Result<Arc<dyn PeripheralLink>, BridgeError>;

    /// Returns a link to a device that is already connected
    async fn open_link(&self, device_id: &str) -> Result<Arc<dyn PeripheralLink>, BridgeError>;

    /// Tears down the connection to a device
    async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError>;
}

/// An open link to one connected peripheral
#[async_trait]
pub trait PeripheralLink: Send + Sync {
    fn id(&self) -> String;

    fn name(&self) -> Option<String>;

    /// Discovers all services and their characteristics on the link
    async fn services(&self) -> Result<Vec<ServiceInfo>, BridgeError>;

    /// Reads the raw value of one characteristic
    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, BridgeError>;

    /// Subscribes to value updates for one characteristic
    async fn notifications(&self, characteristic: Uuid) -> Result<NotifyStream, BridgeError>;
}

/// Adapts a bounded mpsc receiver into a boxed stream
fn receiver_stream<T: Send + 'static>(rx: mpsc::Receiver<T>) -> BoxStream<'static, T> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

/// Production backend over the bluest adapter
pub struct BluestBackend {
    adapter: Adapter,
    /// Device handles seen during the current discovery session
    discovered: Arc<Mutex<HashMap<String, Device>>>,
    /// Device handles with an open connection, kept across scan sessions
    connected: Arc<Mutex<HashMap<String, Device>>>,
}

impl BluestBackend {
    /// How long `ensure_ready` waits for the adapter before reporting the
    /// radio as unavailable
    const READY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates the backend from the default system adapter
    pub async fn new() -> Result<Self, BridgeError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BridgeError::RadioUnavailable("no Bluetooth adapter found".into()))?;
        Ok(Self {
            adapter,
            discovered: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn lookup(&self, device_id: &str) -> Result<Device, BridgeError> {
        let connected = self.connected.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(device) = connected.get(device_id) {
            return Ok(device.clone());
        }
        drop(connected);
        let discovered = self.discovered.lock().unwrap_or_else(|p| p.into_inner());
        discovered
            .get(device_id)
            .cloned()
            .ok_or_else(|| BridgeError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }
}

#[async_trait]
impl RadioBackend for BluestBackend {
    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        match tokio::time::timeout(Self::READY_TIMEOUT, self.adapter.wait_available()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BridgeError::RadioUnavailable(e.to_string())),
            Err(_) => Err(BridgeError::RadioUnavailable(
                "Bluetooth adapter is powered off or not responding".into(),
            )),
        }
    }

    async fn scan(&self) -> Result<ScanStream, BridgeError> {
        // Forget handles from the previous session; connected handles survive
        self.discovered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();

        let adapter = self.adapter.clone();
        let discovered = self.discovered.clone();
        let (tx, rx) = mpsc::channel(64);

        // bluest scan streams borrow the adapter, so the scan runs in its own
        // task that owns an adapter handle and forwards advertisements. The
        // task exits, stopping the underlying scan, once the receiver drops.
        tokio::spawn(async move {
            let stream = match adapter.scan(&[]).await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(Err(BridgeError::ScanFailed(e.to_string()))).await;
                    return;
                }
            };
            futures_util::pin_mut!(stream);
            loop {
                tokio::select! {
                    next = stream.next() => {
                        let Some(found) = next else { break };
                        let device = found.device;
                        let id = device.id().to_string();
                        let name = device.name().ok();
                        let rssi = found.rssi;
                        debug!("advertisement from {} ({:?}, rssi {:?})", id, name, rssi);
                        discovered
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .insert(id.clone(), device);
                        if tx.send(Ok(Advertisement { id, name, rssi })).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
            info!("scan stream closed");
        });

        Ok(receiver_stream(rx))
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn PeripheralLink>, BridgeError> {
        let device = self.lookup(device_id)?;
        if !device.is_connected().await {
            self.adapter
                .connect_device(&device)
                .await
                .map_err(|e| BridgeError::ConnectFailed {
                    device_id: device_id.to_string(),
                    message: e.to_string(),
                })?;
        }
        self.connected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(device_id.to_string(), device.clone());
        Ok(Arc::new(BluestLink { device }))
    }

    async fn open_link(&self, device_id: &str) -> Result<Arc<dyn PeripheralLink>, BridgeError> {
        let device = self.lookup(device_id)?;
        if !device.is_connected().await {
            return Err(BridgeError::DeviceNotFound {
                device_id: device_id.to_string(),
            });
        }
        Ok(Arc::new(BluestLink { device }))
    }

    async fn disconnect(&self, device_id: &str) -> Result<(), BridgeError> {
        let device = self.lookup(device_id)?;
        self.adapter
            .disconnect_device(&device)
            .await
            .map_err(|e| BridgeError::DisconnectFailed {
                device_id: device_id.to_string(),
                message: e.to_string(),
            })?;
        self.connected
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(device_id);
        Ok(())
    }
}

struct BluestLink {
    device: Device,
}

impl BluestLink {
    async fn find_characteristic(
        &self,
        characteristic: Uuid,
    ) -> Result<bluest::Characteristic, BridgeError> {
        let services = self
            .device
            .services()
            .await
            .map_err(|e| BridgeError::ServiceDiscoveryFailed {
                device_id: self.id(),
                message: e.to_string(),
            })?;
        for service in services {
            let chars = match service.characteristics().await {
                Ok(chars) => chars,
                Err(e) => {
                    warn!("characteristic discovery failed on {}: {}", service.uuid(), e);
                    continue;
                }
            };
            if let Some(found) = chars.into_iter().find(|c| c.uuid() == characteristic) {
                return Ok(found);
            }
        }
        Err(BridgeError::CharacteristicNotFound {
            characteristic: characteristic.to_string(),
        })
    }
}

#[async_trait]
impl PeripheralLink for BluestLink {
    fn id(&self) -> String {
        self.device.id().to_string()
    }

    fn name(&self) -> Option<String> {
        self.device.name().ok()
    }

    async fn services(&self) -> Result<Vec<ServiceInfo>, BridgeError> {
        let services = self
            .device
            .services()
            .await
            .map_err(|e| BridgeError::ServiceDiscoveryFailed {
                device_id: self.id(),
                message: e.to_string(),
            })?;
        let mut infos = Vec::with_capacity(services.len());
        for service in services {
            let characteristics = service
                .characteristics()
                .await
                .map_err(|e| BridgeError::ServiceDiscoveryFailed {
                    device_id: self.id(),
                    message: e.to_string(),
                })?
                .iter()
                .map(|c| c.uuid())
                .collect();
            infos.push(ServiceInfo {
                uuid: service.uuid(),
                characteristics,
            });
        }
        Ok(infos)
    }

    async fn read_characteristic(
        &self,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, BridgeError> {
        let chr = self.find_characteristic(characteristic).await?;
        chr.read()
            .await
            .map_err(|e| BridgeError::ReadFailed(e.to_string()))
    }

    async fn notifications(&self, characteristic: Uuid) -> Result<NotifyStream, BridgeError> {
        let chr = self.find_characteristic(characteristic).await?;
        let (tx, rx) = mpsc::channel(64);

        // Same forwarding shape as scan: the notify stream borrows the
        // characteristic, so a task owns it and relays values until the
        // subscription handle drops the receiver.
        tokio::spawn(async move {
            let stream = match chr.notify().await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx
                        .send(Err(BridgeError::SubscriptionFailed(e.to_string())))
                        .await;
                    return;
                }
            };
            futures_util::pin_mut!(stream);
            loop {
                tokio::select! {
                    next = stream.next() => {
                        let Some(item) = next else { break };
                        let item = item.map_err(|e| {
                            BridgeError::SubscriptionFailed(e.to_string())
                        });
                        if tx.send(item).await.is_err() {
                            break;
                        }
                    }
                    _ = tx.closed() => break,
                }
            }
        });

        Ok(receiver_stream(rx))
    }
}
