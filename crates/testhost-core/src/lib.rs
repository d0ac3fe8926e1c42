//! # testhost-core
//!
//! Pairing agent and device session coordinator for the Bluetooth test host.
//!
//! This crate provides:
//! - The pairing agent state machine (capability profiles, request planning,
//!   bounded prompts, pairing sessions)
//! - The device action dispatcher (pair / connect / disconnect / unpair)
//! - Discoverable and discovery sessions with auto-expiring timers
//! - OPP transfer and A2DP streaming coordination
//! - The paired-device cache, coordinator events and common error types
//!
//! The host Bluetooth daemon is reached only through [`AdapterGateway`] and the
//! user only through [`InteractionPort`]; see the `testhost-bluez` crate for a
//! BlueZ-backed gateway.

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod session;
pub mod timer;
pub mod traits;
pub mod transfer;

pub use agent::{
    plan_request, AgentHandle, AgentResponse, Capability, PairingAgent, PairingRequest,
    PairingSessions, Prompt, RequestKind, RequestPlan, SessionTicket,
};
pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use device::{A2dpRole, Address, DeviceCache, DeviceRecord, DiscoveredDevice};
pub use dispatcher::{ActionDescriptor, DeviceAction, DeviceActionDispatcher, Outcome};
pub use error::{CoordinatorError, GatewayError, PreconditionError, Result};
pub use events::{
    CallbackHandler, ChannelHandler, CoordinatorEvent, EventHandler, NoOpHandler, PostAction,
};
pub use session::SessionTimerManager;
pub use timer::{SessionTimer, TimerId};
pub use traits::{AdapterGateway, GatewayResult, InteractionPort, PairingRequestHandler};
pub use transfer::{MediaCommand, StreamState, TransferCoordinator, TransferStatus};
