//! Coordinator events and handlers.
//!
//! Events are how the front end learns that a list entry must be added or
//! removed, a profile view reloaded, or a discovery snapshot rendered.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::{Address, DeviceRecord};

/// Follow-up work requested from the front end after a device action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    /// Add the device to the paired list (if not already present).
    AddToPairedList,
    /// Rebuild the per-device profile views.
    ReloadProfileTabs,
    /// Drop the device from the paired list.
    RemoveFromList,
}

/// Events emitted by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    PostAction {
        action: PostAction,
        address: Address,
    },
    /// Discoverable mode toggled; `expired` when the timeout turned it off.
    DiscoverableChanged { enabled: bool, expired: bool },
    DiscoveryStarted { inquiry_timeout_secs: u64 },
    /// Discovery stopped and a fresh snapshot was taken.
    DiscoverySnapshot {
        devices: Vec<DeviceRecord>,
        timed_out: bool,
    },
    /// A pairing session hit its deadline.
    PairingExpired(Address),
}

/// Handler for coordinator events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called when an event occurs.
    async fn on_event(&self, event: CoordinatorEvent);
}

/// No-op event handler.
pub struct NoOpHandler;

#[async_trait]
impl EventHandler for NoOpHandler {
    async fn on_event(&self, _event: CoordinatorEvent) {}
}

/// Callback-based event handler.
pub struct CallbackHandler<F>
where
    F: Fn(CoordinatorEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(CoordinatorEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(CoordinatorEvent) + Send + Sync,
{
    async fn on_event(&self, event: CoordinatorEvent) {
        (self.callback)(event);
    }
}

/// Forwards events into an unbounded channel.
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn on_event(&self, event: CoordinatorEvent) {
        // Receiver gone means nobody is rendering; nothing to do.
        let _ = self.tx.send(event);
    }
}
