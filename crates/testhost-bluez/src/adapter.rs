//! Bluetooth adapter management.
//!
//! Provides control over the controller under test (power, discoverable,
//! identity) and device lookup by address.

use bluer::{Adapter, Device, Session};
use testhost_core::Address;
use tracing::{debug, info};

use crate::device::to_bluer_address;
use crate::error::{BluezError, Result};

/// Identity and state of the adapter, as shown by the `info` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Interface name (e.g., "hci0").
    pub name: String,
    pub address: String,
    pub alias: String,
    pub powered: bool,
    pub discoverable: bool,
    pub pairable: bool,
}

/// Wrapper around the bluer session and adapter.
#[derive(Clone)]
pub struct BluetoothAdapter {
    session: Session,
    adapter: Adapter,
}

impl BluetoothAdapter {
    /// Open the named adapter, or the default one when `name` is `None`.
    pub async fn new(name: Option<&str>) -> Result<Self> {
        let session = Session::new().await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to create BlueZ session: {}", e))
        })?;

        let adapter = match name {
            Some(name) => session.adapter(name).map_err(|e| {
                BluezError::BlueZ(format!("Failed to open adapter {}: {}", name, e))
            })?,
            None => session.default_adapter().await.map_err(|e| {
                if e.to_string().contains("No default adapter") {
                    BluezError::AdapterNotFound
                } else {
                    BluezError::BlueZ(format!("Failed to get adapter: {}", e))
                }
            })?,
        };

        info!("Using Bluetooth adapter: {}", adapter.name());
        Ok(Self { session, adapter })
    }

    /// Adapter name (e.g., "hci0").
    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    pub async fn is_powered(&self) -> Result<bool> {
        self.adapter
            .is_powered()
            .await
            .map_err(|e| BluezError::BlueZ(format!("Failed to get power state: {}", e)))
    }

    /// Power the adapter on if needed.
    pub async fn ensure_powered(&self) -> Result<()> {
        if !self.is_powered().await? {
            self.adapter.set_powered(true).await.map_err(|e| {
                BluezError::BlueZ(format!("Failed to set power state: {}", e))
            })?;
            info!("Bluetooth adapter powered on");
        }
        Ok(())
    }

    pub async fn is_discoverable(&self) -> Result<bool> {
        self.adapter.is_discoverable().await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to get discoverable state: {}", e))
        })
    }

    /// Toggle discoverability.
    ///
    /// The daemon's own discoverable timeout is zeroed so that only the
    /// coordinator decides when discoverability ends.
    pub async fn set_discoverable(&self, discoverable: bool) -> Result<()> {
        if discoverable {
            self.adapter.set_discoverable_timeout(0).await.map_err(|e| {
                BluezError::BlueZ(format!("Failed to set discoverable timeout: {}", e))
            })?;
            self.adapter.set_pairable(true).await.map_err(|e| {
                BluezError::BlueZ(format!("Failed to set pairable state: {}", e))
            })?;
        }

        self.adapter.set_discoverable(discoverable).await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to set discoverable state: {}", e))
        })?;

        if discoverable {
            debug!("Bluetooth adapter is now discoverable");
        } else {
            debug!("Bluetooth adapter is no longer discoverable");
        }
        Ok(())
    }

    /// Snapshot of the adapter identity and state.
    pub async fn info(&self) -> Result<AdapterInfo> {
        let address = self.adapter.address().await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to get adapter address: {}", e))
        })?;
        let alias = self.adapter.alias().await.map_err(|e| {
            BluezError::BlueZ(format!("Failed to get adapter alias: {}", e))
        })?;

        Ok(AdapterInfo {
            name: self.name().to_string(),
            address: address.to_string(),
            alias,
            powered: self.is_powered().await?,
            discoverable: self.is_discoverable().await?,
            pairable: self.adapter.is_pairable().await.unwrap_or(false),
        })
    }

    /// bluer device handle for `address`.
    pub fn device(&self, address: &Address) -> Result<Device> {
        let addr = to_bluer_address(address)?;
        self.adapter.device(addr).map_err(|e| {
            BluezError::BlueZ(format!("Failed to get device {}: {}", address, e))
        })
    }

    /// Addresses of every device the daemon knows about.
    pub async fn device_addresses(&self) -> Result<Vec<bluer::Address>> {
        self.adapter
            .device_addresses()
            .await
            .map_err(|e| BluezError::BlueZ(format!("Failed to list devices: {}", e)))
    }

    /// Forget a device (unpair and remove).
    pub async fn remove_device(&self, address: &Address) -> Result<()> {
        let addr = to_bluer_address(address)?;
        self.adapter
            .remove_device(addr)
            .await
            .map_err(|e| BluezError::BlueZ(format!("Failed to remove device: {}", e)))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }
}
