//! # testhost-bluez
//!
//! BlueZ-backed [`AdapterGateway`](testhost_core::AdapterGateway) for the
//! Bluetooth test host.
//!
//! ## Features
//!
//! - Adapter control (power, discoverable, pairable) and device discovery
//! - Pair / connect / disconnect / remove primitives
//! - A pairing agent bridge whose callbacks follow the chosen I/O capability
//! - A2DP streaming through BlueALSA and AVRCP media control
//! - OPP send and receive through obexd
//! - Host readiness checks for the daemons above
//!
//! ## Requirements
//!
//! This crate is Linux-only and requires:
//! - BlueZ daemon (bluetooth service)
//! - obexd (for OPP) on the session bus
//! - BlueALSA daemon and an ALSA player (for A2DP)
//!
//! Use `SystemSetup::check()` to verify requirements are met.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use testhost_bluez::{BluezGateway, GatewayOptions};
//! use testhost_core::{Coordinator, CoordinatorConfig, NoOpHandler};
//!
//! async fn example(port: Arc<dyn testhost_core::InteractionPort>) -> anyhow::Result<()> {
//!     let gateway = Arc::new(BluezGateway::new(GatewayOptions::default()).await?);
//!     let coordinator = Coordinator::new(
//!         gateway,
//!         port,
//!         Arc::new(NoOpHandler),
//!         CoordinatorConfig::default(),
//!     );
//!     coordinator.register_agent().await?;
//!     Ok(())
//! }
//! ```

#![cfg(target_os = "linux")]

pub mod a2dp;
pub mod adapter;
pub mod agent;
pub mod device;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod media;
pub mod obex;
pub mod pairing;
pub mod setup;

pub use a2dp::A2dpPlayer;
pub use adapter::{AdapterInfo, BluetoothAdapter};
pub use agent::{build_agent, CallbackSet};
pub use device::{A2DP_SINK_UUID, A2DP_SOURCE_UUID};
pub use discovery::DeviceScanner;
pub use error::{BluezError, Result};
pub use gateway::{BluezGateway, GatewayOptions};
pub use media::MediaController;
pub use obex::ObexClient;
pub use pairing::PairingManager;
pub use setup::{Component, ComponentStatus, SetupIssue, SetupStatus, SystemSetup};
