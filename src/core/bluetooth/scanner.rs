//! Time-boxed device discovery.
//!
//! A discovery session clears the available set, listens for advertisements,
//! and appends each newly seen device in arrival order, publishing a
//! `DeviceDiscovered` event for every insertion. The session stops itself
//! when the scan window elapses; starting a new session first cancels the
//! previous scan task and its timer so two listeners never run at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::backend::RadioBackend;
use crate::core::bluetooth::error::BridgeError;
use crate::core::bluetooth::events::{AdvisoryLog, DeviceEvent, EventChannel};
use crate::core::bluetooth::permissions::PermissionGate;
use crate::core::bluetooth::registry::DeviceRegistry;
use crate::core::bluetooth::types::SensorDevice;

pub struct DiscoverySession {
    backend: Arc<dyn RadioBackend>,
    registry: Arc<DeviceRegistry>,
    events: EventChannel,
    advisories: Arc<AdvisoryLog>,
    gate: PermissionGate,
    scan_window: Duration,
    is_scanning: Arc<AtomicBool>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl DiscoverySession {
    pub fn new(
        backend: Arc<dyn RadioBackend>,
        registry: Arc<DeviceRegistry>,
        events: EventChannel,
        advisories: Arc<AdvisoryLog>,
        scan_window: Duration,
    ) -> Self {
        let gate = PermissionGate::new(backend.clone());
        Self {
            backend,
            registry,
            events,
            advisories,
            gate,
            scan_window,
            is_scanning: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Starts a discovery session, cancelling any session already running.
    ///
    /// Aborts before touching the registry if permissions are denied or the
    /// radio is unavailable. All discovered devices are kept, unnamed ones
    /// included; de-duplication is by device id, first seen wins.
    pub async fn start_discovery(&self) -> Result<(), BridgeError> {
        // hold the task slot across the whole start so concurrent starts
        // cannot interleave
        let mut slot = self.task.lock().await;

        if let Err(e) = self.gate.ensure_permissions().await {
            self.advisories.record(&e);
            return Err(e);
        }

        if let Some((token, handle)) = slot.take() {
            info!("Stopping previous scan before starting a new one");
            Self::cancel_task(token, handle).await;
        }

        self.registry.clear_available();

        let mut stream = match self.backend.scan().await {
            Ok(stream) => stream,
            Err(e) => {
                self.advisories.record(&e);
                return Err(e);
            }
        };

        self.is_scanning.store(true, Ordering::SeqCst);
        self.events.publish(DeviceEvent::ScanStarted);
        info!("Starting device scan ({:?} window)...", self.scan_window);

        let registry = self.registry.clone();
        let events = self.events.clone();
        let advisories = self.advisories.clone();
        let is_scanning = self.is_scanning.clone();
        let token = CancellationToken::new();
        let token_for_task = token.clone();
        let deadline = tokio::time::Instant::now() + self.scan_window;

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token_for_task.cancelled() => {
                        info!("Scan cancelled");
                        break;
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        info!("Scan window elapsed, stopping scan");
                        break;
                    }
                    next = stream.next() => {
                        match next {
                            Some(Ok(adv)) => {
                                let device = SensorDevice::discovered(adv.id, adv.name, adv.rssi);
                                if registry.insert_available(device.clone()) {
                                    debug!(
                                        "Discovered device {} ({})",
                                        device.id,
                                        device.display_name()
                                    );
                                    events.publish(DeviceEvent::DeviceDiscovered(device));
                                }
                            }
                            Some(Err(e)) => {
                                // scan-level failure aborts the session but
                                // keeps whatever was already inserted
                                advisories.record(&e);
                                break;
                            }
                            None => {
                                info!("Scan stream ended");
                                break;
                            }
                        }
                    }
                }
            }
            is_scanning.store(false, Ordering::SeqCst);
            events.publish(DeviceEvent::ScanFinished);
            info!("Stopped scanning");
        });

        *slot = Some((token, handle));
        Ok(())
    }

    /// Stops the active session, if any, and waits for its task to finish
    pub async fn stop_discovery(&self) {
        let taken = self.task.lock().await.take();
        if let Some((token, handle)) = taken {
            Self::cancel_task(token, handle).await;
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }

    async fn cancel_task(token: CancellationToken, handle: JoinHandle<()>) {
        token.cancel();
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                error!("Scan task finished with an unexpected join error: {:?}", e);
            }
        }
    }
}
