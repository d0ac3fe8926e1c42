//! Pair, connect, disconnect and remove primitives.
//!
//! Each primitive reports whether the daemon accepted the operation; errors
//! are reserved for failures to reach the device at all.

use std::time::Duration;

use testhost_core::Address;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::adapter::BluetoothAdapter;
use crate::error::Result;

/// Default timeout for pairing operations.
const PAIRING_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for connection operations.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Device lifecycle against one adapter.
pub struct PairingManager<'a> {
    adapter: &'a BluetoothAdapter,
}

impl<'a> PairingManager<'a> {
    pub fn new(adapter: &'a BluetoothAdapter) -> Self {
        Self { adapter }
    }

    /// Pair with a device, trusting it on success.
    ///
    /// Pairing prompts arrive at the registered agent while this is pending.
    pub async fn pair(&self, address: &Address) -> Result<bool> {
        let device = self.adapter.device(address)?;

        if device.is_paired().await.unwrap_or(false) {
            info!("Device {} is already paired", address);
            return Ok(true);
        }

        info!("Initiating pairing with {}", address);
        match timeout(PAIRING_TIMEOUT, device.pair()).await {
            Ok(Ok(())) => info!("Successfully paired with {}", address),
            Ok(Err(e)) => {
                warn!("Pairing with {} failed: {}", address, e);
                return Ok(false);
            }
            Err(_) => {
                warn!("Pairing with {} timed out", address);
                return Ok(false);
            }
        }

        if let Err(e) = device.set_trusted(true).await {
            warn!("Failed to auto-trust device: {}", e);
        }
        Ok(true)
    }

    pub async fn connect(&self, address: &Address) -> Result<bool> {
        let device = self.adapter.device(address)?;

        if device.is_connected().await.unwrap_or(false) {
            info!("Device {} is already connected", address);
            return Ok(true);
        }

        info!("Connecting to {}", address);
        match timeout(CONNECT_TIMEOUT, device.connect()).await {
            Ok(Ok(())) => {
                info!("Successfully connected to {}", address);
                Ok(true)
            }
            Ok(Err(e)) => {
                warn!("Connection to {} failed: {}", address, e);
                Ok(false)
            }
            Err(_) => {
                warn!("Connection to {} timed out", address);
                Ok(false)
            }
        }
    }

    pub async fn disconnect(&self, address: &Address) -> Result<bool> {
        let device = self.adapter.device(address)?;

        if !device.is_connected().await.unwrap_or(false) {
            debug!("Device {} is not connected", address);
            return Ok(true);
        }

        info!("Disconnecting from {}", address);
        match device.disconnect().await {
            Ok(()) => {
                info!("Disconnected from {}", address);
                Ok(true)
            }
            Err(e) => {
                warn!("Failed to disconnect {}: {}", address, e);
                Ok(false)
            }
        }
    }

    /// Unpair and forget a device.
    pub async fn remove(&self, address: &Address) -> Result<bool> {
        info!("Removing device {}", address);
        match self.adapter.remove_device(address).await {
            Ok(()) => {
                info!("Device {} removed", address);
                Ok(true)
            }
            Err(e) => {
                warn!("{}", e);
                Ok(false)
            }
        }
    }

    pub async fn is_paired(&self, address: &Address) -> Result<bool> {
        Ok(self.adapter.device(address)?.is_paired().await?)
    }

    pub async fn is_connected(&self, address: &Address) -> Result<bool> {
        Ok(self.adapter.device(address)?.is_connected().await?)
    }
}
