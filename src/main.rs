//! Demo shell for the sensor bridge: runs one discovery session, prints the
//! devices it finds, and connects to the first available unit.

use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use sensor_bridge::core::bluetooth::DeviceEvent;
use sensor_bridge::{logging, AppState, BridgeConfig};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config_dir = std::env::current_dir()?;
    let config = BridgeConfig::load(&config_dir).await?;
    let state = AppState::new(config.clone()).await?;
    let manager = state.bluetooth_manager();

    let mut events = manager.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DeviceEvent::DeviceDiscovered(device) => {
                    info!("available: {} ({})", device.id, device.display_name());
                }
                DeviceEvent::DeviceConnected(device) => {
                    info!(
                        "connected: {} battery {}",
                        device.display_name(),
                        device.battery_level
                    );
                }
                DeviceEvent::DeviceDisconnected { device_id } => {
                    info!("disconnected: {}", device_id);
                }
                DeviceEvent::ScanStarted => info!("scanning..."),
                DeviceEvent::ScanFinished => info!("scan finished"),
            }
        }
    });

    manager.scan_for_devices().await?;
    tokio::time::sleep(config.scan_window() + Duration::from_millis(200)).await;

    let available = manager.available_devices();
    info!("{} device(s) available", available.len());

    if let Some(first) = available.first() {
        if manager.connect_to_device(&first.id).await {
            manager.disconnect_device(&first.id).await;
        }
    }

    for advisory in manager.drain_advisories() {
        warn!("{}", advisory);
    }

    state.teardown().await;
    printer.abort();
    Ok(())
}
