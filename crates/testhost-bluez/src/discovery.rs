//! Bluetooth device discovery.
//!
//! BlueZ keeps discovery running for as long as the event stream returned by
//! `discover_devices()` is alive, so the stream is held by a background task
//! that records every address it sees. Stopping aborts the task.

use std::sync::Arc;

use futures::StreamExt;
use testhost_core::DiscoveredDevice;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapter::BluetoothAdapter;
use crate::device::discovered_device;
use crate::error::{BluezError, Result};

/// Runs at most one discovery at a time and remembers what it found.
pub struct DeviceScanner {
    adapter: BluetoothAdapter,
    task: Mutex<Option<JoinHandle<()>>>,
    seen: Arc<Mutex<Vec<bluer::Address>>>,
}

impl DeviceScanner {
    pub fn new(adapter: BluetoothAdapter) -> Self {
        Self {
            adapter,
            task: Mutex::new(None),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start discovery, clearing the previous results.
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            debug!("Discovery already running");
            return Ok(());
        }

        self.adapter.ensure_powered().await?;
        let stream = self.adapter.adapter().discover_devices().await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to start discovery: {}", e))
        })?;

        self.seen.lock().await.clear();
        let seen = self.seen.clone();
        *task = Some(tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(event) = stream.next().await {
                match event {
                    bluer::AdapterEvent::DeviceAdded(addr) => {
                        let mut seen = seen.lock().await;
                        if !seen.contains(&addr) {
                            debug!("Discovered device: {}", addr);
                            seen.push(addr);
                        }
                    }
                    bluer::AdapterEvent::DeviceRemoved(addr) => {
                        debug!("Device removed: {}", addr);
                        seen.lock().await.retain(|a| *a != addr);
                    }
                    _ => {}
                }
            }
        }));

        info!("Bluetooth discovery started on {}", self.adapter.name());
        Ok(())
    }

    /// Stop discovery. Errors if none was running.
    pub async fn stop(&self) -> Result<()> {
        match self.task.lock().await.take() {
            Some(task) => {
                task.abort();
                info!("Bluetooth discovery stopped");
                Ok(())
            }
            None => Err(BluezError::BlueZ("No discovery started".to_string())),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Devices seen by the current or most recent discovery.
    pub async fn discovered(&self) -> Vec<DiscoveredDevice> {
        let addresses = self.seen.lock().await.clone();
        let mut devices = Vec::with_capacity(addresses.len());
        for addr in addresses {
            match self.adapter.adapter().device(addr) {
                Ok(device) => devices.push(discovered_device(&device, self.adapter.name()).await),
                Err(e) => warn!("Failed to get device {}: {}", addr, e),
            }
        }
        devices
    }
}
