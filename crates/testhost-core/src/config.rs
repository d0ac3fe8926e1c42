//! Coordinator tuning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::Capability;

/// Coordinator configuration. Every field has a default, so a partial TOML
/// table is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Capability used when registering the agent without an explicit one.
    pub capability: Capability,
    /// Lifetime of a pairing session; prompts are bounded by it.
    pub pairing_timeout_secs: u64,
    /// Delay before re-checking paired state after a display request.
    pub display_settle_secs: u64,
    /// Default discoverable timeout (0 = unbounded).
    pub discoverable_timeout_secs: u64,
    /// Default inquiry timeout (0 = unbounded).
    pub inquiry_timeout_secs: u64,
    /// File extensions accepted for A2DP streaming, without the dot.
    pub audio_extensions: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            capability: Capability::default(),
            pairing_timeout_secs: 10,
            display_settle_secs: 5,
            discoverable_timeout_secs: 0,
            inquiry_timeout_secs: 0,
            audio_extensions: vec!["wav".to_string()],
        }
    }
}

impl CoordinatorConfig {
    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing_timeout_secs)
    }

    pub fn display_settle(&self) -> Duration {
        Duration::from_secs(self.display_settle_secs)
    }
}
