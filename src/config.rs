//! `testhost.toml` loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use testhost_bluez::GatewayOptions;
use testhost_core::CoordinatorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Adapter to use (e.g. "hci0"); the default adapter when unset.
    pub adapter: Option<String>,
    /// Where accepted OPP pushes are stored.
    pub receive_dir: PathBuf,
    /// ALSA player used for A2DP streaming.
    pub player: String,
    pub obex_timeout_secs: u64,
    pub coordinator: CoordinatorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adapter: None,
            receive_dir: PathBuf::from("received"),
            player: "aplay".to_string(),
            obex_timeout_secs: 60,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Gateway settings; `adapter` overrides the configured adapter.
    ///
    /// obexd runs with its own working directory, so a relative
    /// `receive_dir` is resolved against ours here.
    pub fn gateway_options(&self, adapter: Option<String>) -> Result<GatewayOptions> {
        let receive_dir = std::path::absolute(&self.receive_dir).with_context(|| {
            format!("Failed to resolve {}", self.receive_dir.display())
        })?;
        Ok(GatewayOptions {
            adapter: adapter.or_else(|| self.adapter.clone()),
            player: self.player.clone(),
            receive_dir,
            obex_timeout: Duration::from_secs(self.obex_timeout_secs),
        })
    }
}
