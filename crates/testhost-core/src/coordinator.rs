//! Facade wiring the coordinator components around one gateway.

use std::sync::Arc;

use tracing::info;

use crate::agent::{AgentHandle, PairingAgent};
use crate::config::CoordinatorConfig;
use crate::device::{DeviceCache, DeviceRecord};
use crate::dispatcher::DeviceActionDispatcher;
use crate::error::Result;
use crate::events::EventHandler;
use crate::session::SessionTimerManager;
use crate::traits::{AdapterGateway, InteractionPort};
use crate::transfer::TransferCoordinator;

/// Pairing agent, device actions, sessions and transfers sharing one
/// gateway, one interaction port and one event handler.
pub struct Coordinator {
    config: CoordinatorConfig,
    cache: Arc<DeviceCache>,
    agent: Arc<PairingAgent>,
    dispatcher: DeviceActionDispatcher,
    sessions: SessionTimerManager,
    transfers: TransferCoordinator,
}

impl Coordinator {
    pub fn new(
        gateway: Arc<dyn AdapterGateway>,
        port: Arc<dyn InteractionPort>,
        events: Arc<dyn EventHandler>,
        config: CoordinatorConfig,
    ) -> Self {
        let cache = Arc::new(DeviceCache::new(gateway.clone()));
        let agent = Arc::new(PairingAgent::new(
            gateway.clone(),
            port.clone(),
            cache.clone(),
            events.clone(),
            &config,
        ));
        let dispatcher = DeviceActionDispatcher::new(
            gateway.clone(),
            port.clone(),
            cache.clone(),
            events.clone(),
            agent.clone(),
        );
        let sessions = SessionTimerManager::new(gateway.clone(), events);
        let transfers = TransferCoordinator::new(gateway, port, config.audio_extensions.clone());

        Self {
            config,
            cache,
            agent,
            dispatcher,
            sessions,
            transfers,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DeviceCache> {
        &self.cache
    }

    pub fn agent(&self) -> &Arc<PairingAgent> {
        &self.agent
    }

    pub fn dispatcher(&self) -> &DeviceActionDispatcher {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &SessionTimerManager {
        &self.sessions
    }

    pub fn transfers(&self) -> &TransferCoordinator {
        &self.transfers
    }

    /// Populate the paired-device cache from the daemon.
    pub async fn load_paired_devices(&self) -> Result<Vec<DeviceRecord>> {
        let devices = self.cache.reload().await?;
        info!("Loaded {} paired devices", devices.len());
        Ok(devices)
    }

    /// Register the agent with the configured capability.
    pub async fn register_agent(&self) -> Result<AgentHandle> {
        self.agent.register(self.config.capability).await
    }
}
