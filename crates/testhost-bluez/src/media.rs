//! AVRCP media control through `org.bluez.MediaControl1`.

use testhost_core::{Address, MediaCommand};
use tracing::info;
use zbus::proxy;
use zbus::Connection;

use crate::error::{BluezError, Result};

/// Proxy for org.bluez.MediaControl1, exposed on the device object.
#[proxy(interface = "org.bluez.MediaControl1", default_service = "org.bluez")]
pub(crate) trait MediaControl1 {
    fn play(&self) -> zbus::Result<()>;

    fn pause(&self) -> zbus::Result<()>;

    fn next(&self) -> zbus::Result<()>;

    fn previous(&self) -> zbus::Result<()>;

    fn rewind(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn connected(&self) -> zbus::Result<bool>;
}

/// Sends AVRCP commands to connected devices.
pub struct MediaController {
    connection: Connection,
    adapter_name: String,
}

impl MediaController {
    pub async fn new(adapter_name: impl Into<String>) -> Result<Self> {
        let connection = Connection::system()
            .await
            .map_err(|e| BluezError::BlueZ(format!("Failed to connect to system bus: {}", e)))?;
        Ok(Self {
            connection,
            adapter_name: adapter_name.into(),
        })
    }

    async fn proxy(&self, address: &Address) -> Result<MediaControl1Proxy<'static>> {
        let path = address.to_device_path(&self.adapter_name);
        MediaControl1Proxy::builder(&self.connection)
            .path(path)
            .map_err(|e| BluezError::DeviceNotFound(format!("{}: {}", address, e)))?
            .build()
            .await
            .map_err(|e| BluezError::BlueZ(format!("MediaControl1 unavailable: {}", e)))
    }

    pub async fn send(&self, command: MediaCommand, address: &Address) -> Result<()> {
        let proxy = self.proxy(address).await?;
        let result = match command {
            MediaCommand::Play => proxy.play().await,
            MediaCommand::Pause => proxy.pause().await,
            MediaCommand::Next => proxy.next().await,
            MediaCommand::Previous => proxy.previous().await,
            MediaCommand::Rewind => proxy.rewind().await,
        };
        result.map_err(|e| BluezError::BlueZ(format!("Media {} failed: {}", command, e)))?;
        info!("Sent media {} to {}", command, address);
        Ok(())
    }
}
