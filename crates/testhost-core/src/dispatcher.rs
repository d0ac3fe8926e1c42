//! Device lifecycle actions: pair, connect, disconnect, unpair.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::PairingAgent;
use crate::device::{Address, DeviceCache};
use crate::error::{CoordinatorError, GatewayError, Result};
use crate::events::{CoordinatorEvent, EventHandler, PostAction};
use crate::traits::{AdapterGateway, InteractionPort};

/// A device lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAction {
    Pair,
    Connect,
    Disconnect,
    Unpair,
}

/// Static description of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDescriptor {
    /// Gateway primitive invoked.
    pub primitive: &'static str,
    pub success: &'static str,
    pub failure: &'static str,
    pub post_action: PostAction,
}

const PAIR: ActionDescriptor = ActionDescriptor {
    primitive: "pair",
    success: "Device paired successfully.",
    failure: "Failed to pair device.",
    post_action: PostAction::AddToPairedList,
};

const CONNECT: ActionDescriptor = ActionDescriptor {
    primitive: "connect",
    success: "Device connected successfully.",
    failure: "Failed to connect device.",
    post_action: PostAction::ReloadProfileTabs,
};

const DISCONNECT: ActionDescriptor = ActionDescriptor {
    primitive: "disconnect",
    success: "Device disconnected successfully.",
    failure: "Failed to disconnect device.",
    post_action: PostAction::ReloadProfileTabs,
};

const UNPAIR: ActionDescriptor = ActionDescriptor {
    primitive: "unpair_device",
    success: "Device unpaired successfully.",
    failure: "Failed to unpair device.",
    post_action: PostAction::RemoveFromList,
};

impl DeviceAction {
    pub const ALL: [DeviceAction; 4] = [
        DeviceAction::Pair,
        DeviceAction::Connect,
        DeviceAction::Disconnect,
        DeviceAction::Unpair,
    ];

    pub fn descriptor(&self) -> &'static ActionDescriptor {
        match self {
            DeviceAction::Pair => &PAIR,
            DeviceAction::Connect => &CONNECT,
            DeviceAction::Disconnect => &DISCONNECT,
            DeviceAction::Unpair => &UNPAIR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceAction::Pair => "pair",
            DeviceAction::Connect => "connect",
            DeviceAction::Disconnect => "disconnect",
            DeviceAction::Unpair => "unpair",
        }
    }

    /// Capitalized name, used as notification title.
    pub fn title(&self) -> &'static str {
        match self {
            DeviceAction::Pair => "Pair",
            DeviceAction::Connect => "Connect",
            DeviceAction::Disconnect => "Disconnect",
            DeviceAction::Unpair => "Unpair",
        }
    }
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceAction {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        DeviceAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoordinatorError::UnknownAction(s.to_string()))
    }
}

/// Result of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub action: DeviceAction,
    pub address: Address,
    pub success: bool,
    /// Success or failure text from the descriptor.
    pub message: &'static str,
    /// Gateway error text, when the primitive itself failed.
    pub error: Option<String>,
    /// Post-action that was emitted, if any.
    pub post_action: Option<PostAction>,
}

/// Runs device actions against the gateway.
pub struct DeviceActionDispatcher {
    gateway: Arc<dyn AdapterGateway>,
    port: Arc<dyn InteractionPort>,
    cache: Arc<DeviceCache>,
    events: Arc<dyn EventHandler>,
    agent: Arc<PairingAgent>,
}

impl DeviceActionDispatcher {
    pub fn new(
        gateway: Arc<dyn AdapterGateway>,
        port: Arc<dyn InteractionPort>,
        cache: Arc<DeviceCache>,
        events: Arc<dyn EventHandler>,
        agent: Arc<PairingAgent>,
    ) -> Self {
        Self {
            gateway,
            port,
            cache,
            events,
            agent,
        }
    }

    /// Perform an action named by string.
    pub async fn perform(&self, action: &str, address: &Address, reload_profiles: bool) -> Result<Outcome> {
        let action = match action.parse::<DeviceAction>() {
            Ok(action) => action,
            Err(e) => {
                warn!("Unknown action: {}", action);
                return Err(e);
            }
        };
        self.perform_action(action, address, reload_profiles).await
    }

    /// Perform `action` on `address`.
    ///
    /// Gateway errors count as failure. The device cache is refreshed after
    /// every outcome. The post-action runs unconditionally except for
    /// `connect`, where it only runs when `reload_profiles` is set.
    pub async fn perform_action(
        &self,
        action: DeviceAction,
        address: &Address,
        reload_profiles: bool,
    ) -> Result<Outcome> {
        let descriptor = action.descriptor();

        let session = match action {
            DeviceAction::Pair => Some(
                self.agent
                    .sessions()
                    .begin(address, Some(self.agent.capability().await))
                    .await?,
            ),
            _ => None,
        };

        info!("Performing {} on {}", descriptor.primitive, address);
        let result = self.invoke(action, address).await;

        if let Some(ticket) = session {
            self.agent.sessions().finish(&ticket).await;
        }

        let (success, error) = match result {
            Ok(success) => (success, None),
            Err(e) => {
                warn!("{} on {} failed: {}", descriptor.primitive, address, e);
                (false, Some(e.to_string()))
            }
        };

        let message = if success {
            descriptor.success
        } else {
            descriptor.failure
        };
        let text = format!("{}: {}", address, message);
        if success {
            self.port.notify_info(action.title(), &text).await;
        } else {
            self.port.notify_warning(action.title(), &text).await;
        }

        self.cache.invalidate(address).await;

        let post_action = match action {
            DeviceAction::Connect if !reload_profiles => None,
            _ => Some(descriptor.post_action),
        };
        if let Some(post) = post_action {
            self.events
                .on_event(CoordinatorEvent::PostAction {
                    action: post,
                    address: address.clone(),
                })
                .await;
        }

        Ok(Outcome {
            action,
            address: address.clone(),
            success,
            message,
            error,
            post_action,
        })
    }

    async fn invoke(&self, action: DeviceAction, address: &Address) -> std::result::Result<bool, GatewayError> {
        match action {
            DeviceAction::Pair => self.gateway.pair(address).await,
            DeviceAction::Connect => self.gateway.connect(address).await,
            DeviceAction::Disconnect => self.gateway.disconnect(address).await,
            DeviceAction::Unpair => self.gateway.unpair_device(address).await,
        }
    }
}
