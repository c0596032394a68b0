//! Push-style characteristic notifications.
//!
//! The bridge subscribes to value updates on a connected device's
//! characteristic and relays each payload, decoded to text, to a callback.
//! Individual delivery errors are logged and the subscription stays live;
//! the returned handle deregisters the listener when released.

use std::sync::Arc;

use futures_util::StreamExt;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::backend::RadioBackend;
use crate::core::bluetooth::error::BridgeError;

pub struct NotificationBridge {
    backend: Arc<dyn RadioBackend>,
}

/// Handle to a live notification subscription.
///
/// Dropping the handle cancels the listener task, which in turn releases the
/// underlying notification stream and stops the monitor.
pub struct NotificationSubscription {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl NotificationSubscription {
    /// Stops the listener and waits for its task to finish
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl NotificationBridge {
    pub fn new(backend: Arc<dyn RadioBackend>) -> Self {
        Self { backend }
    }

    /// Registers a persistent listener on a characteristic of a connected
    /// device. Each delivered value is decoded to text and passed to
    /// `on_data`.
    pub async fn subscribe(
        &self,
        device_id: &str,
        characteristic: Uuid,
        on_data: impl Fn(String) + Send + Sync + 'static,
    ) -> Result<NotificationSubscription, BridgeError> {
        let link = self.backend.open_link(device_id).await?;
        let mut stream = link.notifications(characteristic).await?;
        info!(
            "Subscribed to notifications on {} for device {}",
            characteristic, device_id
        );

        let token = CancellationToken::new();
        let token_for_task = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token_for_task.cancelled() => break,
                    next = stream.next() => {
                        match next {
                            Some(Ok(bytes)) => {
                                let text = String::from_utf8_lossy(&bytes).into_owned();
                                on_data(text);
                            }
                            Some(Err(e)) => {
                                // delivery errors do not terminate the subscription
                                error!("Notification error: {}", e);
                            }
                            None => {
                                info!("Notification stream ended");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(NotificationSubscription {
            token,
            handle: Some(handle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::backend::mock::{MockBackend, MockPeripheral};
    use crate::core::bluetooth::constants::{UUID_READ_DATA_CHAR, UUID_SENSOR_SERVICE};
    use std::sync::Mutex;
    use std::time::Duration;

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while !cond() {
            if tokio::time::Instant::now() > deadline {
                panic!("condition not met within deadline");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn payloads_are_decoded_and_delivered_past_errors() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(
            MockPeripheral::new("X", None)
                .with_service(UUID_SENSOR_SERVICE, &[UUID_READ_DATA_CHAR])
                .with_notify_feed(
                    UUID_READ_DATA_CHAR,
                    vec![
                        Ok(b"one".to_vec()),
                        Err(BridgeError::SubscriptionFailed("glitch".into())),
                        Ok(b"two".to_vec()),
                    ],
                ),
        );
        backend.connect("X").await.unwrap();

        let bridge = NotificationBridge::new(backend);
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let subscription = bridge
            .subscribe("X", UUID_READ_DATA_CHAR, move |data| {
                sink.lock().unwrap().push(data);
            })
            .await
            .unwrap();

        wait_for(|| received.lock().unwrap().len() == 2).await;
        assert_eq!(*received.lock().unwrap(), vec!["one", "two"]);
        // the mid-stream error did not end the subscription
        assert!(subscription.is_active());

        subscription.unsubscribe().await;
    }

    #[tokio::test]
    async fn subscribing_to_unconnected_device_is_refused() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(MockPeripheral::new("X", None));
        let bridge = NotificationBridge::new(backend);

        let result = bridge.subscribe("X", UUID_READ_DATA_CHAR, |_| {}).await;
        assert!(matches!(result, Err(BridgeError::DeviceNotFound { .. })));
    }

    #[tokio::test]
    async fn unsubscribe_stops_the_listener() {
        let backend = Arc::new(MockBackend::new());
        backend.add_peripheral(
            MockPeripheral::new("X", None)
                .with_service(UUID_SENSOR_SERVICE, &[UUID_READ_DATA_CHAR])
                .with_notify_feed(UUID_READ_DATA_CHAR, vec![Ok(b"tick".to_vec())]),
        );
        backend.connect("X").await.unwrap();

        let bridge = NotificationBridge::new(backend);
        let subscription = bridge
            .subscribe("X", UUID_READ_DATA_CHAR, |_| {})
            .await
            .unwrap();
        assert!(subscription.is_active());
        subscription.unsubscribe().await;
    }
}
