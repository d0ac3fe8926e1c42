//! Trait seams between the coordinator and its collaborators (enables mocking in tests).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::{AgentResponse, Capability, PairingRequest};
use crate::device::{A2dpRole, Address, DeviceRecord, DiscoveredDevice};
use crate::error::GatewayError;
use crate::transfer::MediaCommand;

/// Result type for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Capability surface of the host Bluetooth daemon.
///
/// Boolean results report whether the daemon accepted the operation; an
/// `Err` means the call itself failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdapterGateway: Send + Sync {
    async fn pair(&self, address: &Address) -> GatewayResult<bool>;

    async fn connect(&self, address: &Address) -> GatewayResult<bool>;

    async fn disconnect(&self, address: &Address) -> GatewayResult<bool>;

    /// Remove the device from the daemon (unpair and forget).
    async fn unpair_device(&self, address: &Address) -> GatewayResult<bool>;

    async fn is_device_connected(&self, address: &Address) -> GatewayResult<bool>;

    async fn is_device_paired(&self, address: &Address) -> GatewayResult<bool>;

    async fn get_paired_devices(&self) -> GatewayResult<HashMap<Address, DeviceRecord>>;

    async fn start_discovery(&self) -> GatewayResult<()>;

    async fn stop_discovery(&self) -> GatewayResult<()>;

    /// Devices seen by the current (or most recent) discovery.
    async fn get_discovered_devices(&self) -> GatewayResult<Vec<DiscoveredDevice>>;

    async fn set_discoverable_mode(&self, enabled: bool) -> GatewayResult<()>;

    async fn get_a2dp_role_for_device(&self, address: &Address) -> GatewayResult<A2dpRole>;

    async fn start_a2dp_stream(&self, address: &Address, file: &Path) -> GatewayResult<bool>;

    async fn stop_a2dp_stream(&self) -> GatewayResult<()>;

    async fn media_control(&self, command: MediaCommand, address: &Address) -> GatewayResult<()>;

    /// Push a file over OPP, returning the daemon's terminal transfer state.
    async fn send_file(&self, address: &Address, file: &Path) -> GatewayResult<String>;

    /// Wait for an incoming OPP transfer, confirming it through `port`.
    async fn receive_file(&self, port: Arc<dyn InteractionPort>) -> GatewayResult<Option<PathBuf>>;

    /// Register `handler` as the pairing agent with the given capability.
    async fn register_agent(
        &self,
        capability: Capability,
        handler: Arc<dyn PairingRequestHandler>,
    ) -> GatewayResult<()>;

    async fn unregister_agent(&self) -> GatewayResult<()>;
}

/// Source of user decisions and sink for user-visible notifications.
///
/// Prompt calls suspend the caller until the user answers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InteractionPort: Send + Sync {
    /// `None` when the user cancels.
    async fn prompt_text(&self, title: &str, prompt: &str) -> Option<String>;

    /// `None` when the user cancels.
    async fn prompt_int(&self, title: &str, prompt: &str) -> Option<u32>;

    async fn prompt_yes_no(&self, title: &str, prompt: &str) -> bool;

    async fn notify_info(&self, title: &str, message: &str);

    async fn notify_warning(&self, title: &str, message: &str);

    async fn notify_error(&self, title: &str, message: &str);

    async fn confirm_incoming_file(&self, path: &Path) -> bool;
}

/// Receiver of pairing-agent callbacks from the gateway.
#[async_trait]
pub trait PairingRequestHandler: Send + Sync {
    /// Must always resolve to some response.
    async fn handle_pairing_request(&self, request: PairingRequest) -> AgentResponse;
}
