//! [`AdapterGateway`] backed by BlueZ, obexd and BlueALSA.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use testhost_core::{
    A2dpRole, AdapterGateway, Address, Capability, DeviceRecord, DiscoveredDevice, GatewayResult,
    InteractionPort, MediaCommand, PairingRequestHandler,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::a2dp::{A2dpPlayer, DEFAULT_PLAYER};
use crate::adapter::BluetoothAdapter;
use crate::agent::build_agent;
use crate::device::{a2dp_role, device_record, device_uuids, from_bluer_address};
use crate::discovery::DeviceScanner;
use crate::error::{BluezError, Result};
use crate::media::MediaController;
use crate::obex::ObexClient;
use crate::pairing::PairingManager;

/// Host-side settings for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Adapter name; the default adapter when `None`.
    pub adapter: Option<String>,
    /// ALSA player used for A2DP streaming.
    pub player: String,
    /// Directory accepted OPP pushes are stored in.
    pub receive_dir: PathBuf,
    /// Bound on how long an OPP transfer (or the wait for one) may take.
    pub obex_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            adapter: None,
            player: DEFAULT_PLAYER.to_string(),
            receive_dir: std::env::temp_dir(),
            obex_timeout: Duration::from_secs(60),
        }
    }
}

pub struct BluezGateway {
    adapter: BluetoothAdapter,
    scanner: DeviceScanner,
    player: A2dpPlayer,
    media: MediaController,
    obex: OnceCell<ObexClient>,
    options: GatewayOptions,
    agent: Mutex<Option<bluer::agent::AgentHandle>>,
}

impl BluezGateway {
    pub async fn new(options: GatewayOptions) -> Result<Self> {
        let adapter = BluetoothAdapter::new(options.adapter.as_deref()).await?;
        adapter.ensure_powered().await?;
        let media = MediaController::new(adapter.name()).await?;

        Ok(Self {
            scanner: DeviceScanner::new(adapter.clone()),
            player: A2dpPlayer::new(options.player.clone()),
            media,
            obex: OnceCell::new(),
            agent: Mutex::new(None),
            adapter,
            options,
        })
    }

    pub fn adapter(&self) -> &BluetoothAdapter {
        &self.adapter
    }

    /// obexd lives on the session bus, which may be absent; connect on first use.
    async fn obex(&self) -> Result<&ObexClient> {
        self.obex
            .get_or_try_init(|| ObexClient::new(self.options.obex_timeout))
            .await
    }

    fn pairing(&self) -> PairingManager<'_> {
        PairingManager::new(&self.adapter)
    }
}

#[async_trait]
impl AdapterGateway for BluezGateway {
    async fn pair(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().pair(address).await?)
    }

    async fn connect(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().connect(address).await?)
    }

    async fn disconnect(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().disconnect(address).await?)
    }

    async fn unpair_device(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().remove(address).await?)
    }

    async fn is_device_connected(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().is_connected(address).await?)
    }

    async fn is_device_paired(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.pairing().is_paired(address).await?)
    }

    async fn get_paired_devices(&self) -> GatewayResult<HashMap<Address, DeviceRecord>> {
        let mut paired = HashMap::new();
        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.adapter().device(addr).map_err(BluezError::from)?;
            if !device.is_paired().await.unwrap_or(false) {
                continue;
            }
            let record = device_record(&device, self.adapter.name()).await;
            paired.insert(from_bluer_address(addr), record);
        }
        debug!("{} paired device(s)", paired.len());
        Ok(paired)
    }

    async fn start_discovery(&self) -> GatewayResult<()> {
        Ok(self.scanner.start().await?)
    }

    async fn stop_discovery(&self) -> GatewayResult<()> {
        Ok(self.scanner.stop().await?)
    }

    async fn get_discovered_devices(&self) -> GatewayResult<Vec<DiscoveredDevice>> {
        Ok(self.scanner.discovered().await)
    }

    async fn set_discoverable_mode(&self, enabled: bool) -> GatewayResult<()> {
        Ok(self.adapter.set_discoverable(enabled).await?)
    }

    async fn get_a2dp_role_for_device(&self, address: &Address) -> GatewayResult<A2dpRole> {
        let device = self.adapter.device(address)?;
        Ok(a2dp_role(&device_uuids(&device).await))
    }

    async fn start_a2dp_stream(&self, address: &Address, file: &Path) -> GatewayResult<bool> {
        Ok(self.player.start(address, file).await?)
    }

    async fn stop_a2dp_stream(&self) -> GatewayResult<()> {
        Ok(self.player.stop().await?)
    }

    async fn media_control(&self, command: MediaCommand, address: &Address) -> GatewayResult<()> {
        Ok(self.media.send(command, address).await?)
    }

    async fn send_file(&self, address: &Address, file: &Path) -> GatewayResult<String> {
        Ok(self.obex().await?.send_file(address, file).await?)
    }

    async fn receive_file(&self, port: Arc<dyn InteractionPort>) -> GatewayResult<Option<PathBuf>> {
        let obex = self.obex().await?;
        Ok(obex.receive_file(port, &self.options.receive_dir).await?)
    }

    async fn register_agent(
        &self,
        capability: Capability,
        handler: Arc<dyn PairingRequestHandler>,
    ) -> GatewayResult<()> {
        let mut slot = self.agent.lock().await;
        if slot.is_some() {
            return Err(BluezError::AgentAlreadyRegistered.into());
        }

        let handle = self
            .adapter
            .session()
            .register_agent(build_agent(capability, handler))
            .await
            .map_err(BluezError::from)?;
        info!("Pairing agent registered with capability {}", capability);
        *slot = Some(handle);
        Ok(())
    }

    async fn unregister_agent(&self) -> GatewayResult<()> {
        match self.agent.lock().await.take() {
            // Dropping the handle unregisters the agent.
            Some(_handle) => {
                info!("Pairing agent unregistered");
                Ok(())
            }
            None => Err(BluezError::AgentNotRegistered.into()),
        }
    }
}
