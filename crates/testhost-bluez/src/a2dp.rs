//! A2DP source streaming.
//!
//! Audio is played to the remote sink through BlueALSA by running an ALSA
//! player against the device's `bluealsa:` PCM. At most one stream runs at a
//! time; stopping kills the player.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use testhost_core::Address;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::device::bluealsa_pcm;
use crate::error::{BluezError, Result};

/// Default ALSA player.
pub const DEFAULT_PLAYER: &str = "aplay";

/// How long a freshly spawned player must survive to count as started.
const STARTUP_GRACE: Duration = Duration::from_millis(300);

struct Playback {
    address: Address,
    child: Child,
}

/// Runs one ALSA player process per active stream.
pub struct A2dpPlayer {
    program: String,
    current: Mutex<Option<Playback>>,
}

impl A2dpPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            current: Mutex::new(None),
        }
    }

    /// Arguments passed to the player for `address` and `file`.
    pub fn player_args(address: &Address, file: &Path) -> Vec<String> {
        vec![
            "-q".to_string(),
            "-D".to_string(),
            bluealsa_pcm(address),
            file.display().to_string(),
        ]
    }

    /// Start streaming `file` to `address`, replacing any running stream.
    ///
    /// Returns `false` when the player exits with an error right away.
    pub async fn start(&self, address: &Address, file: &Path) -> Result<bool> {
        let mut current = self.current.lock().await;
        if let Some(mut previous) = current.take() {
            debug!("Replacing stream to {}", previous.address);
            let _ = previous.child.kill().await;
        }

        let mut child = Command::new(&self.program)
            .args(Self::player_args(address, file))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BluezError::Player(format!("Failed to start {}: {}", self.program, e)))?;

        tokio::time::sleep(STARTUP_GRACE).await;
        if let Some(status) = child.try_wait()? {
            if !status.success() {
                warn!("{} exited immediately with {}", self.program, status);
                return Ok(false);
            }
        }

        info!("Streaming {} to {}", file.display(), address);
        *current = Some(Playback {
            address: address.clone(),
            child,
        });
        Ok(true)
    }

    /// Stop the running stream, if any.
    pub async fn stop(&self) -> Result<()> {
        let Some(mut playback) = self.current.lock().await.take() else {
            debug!("No stream to stop");
            return Ok(());
        };

        if playback.child.try_wait()?.is_none() {
            playback
                .child
                .kill()
                .await
                .map_err(|e| BluezError::Player(format!("Failed to stop player: {}", e)))?;
        }
        info!("Stopped streaming to {}", playback.address);
        Ok(())
    }

    /// Address of the device currently streamed to.
    pub async fn streaming_to(&self) -> Option<Address> {
        let mut current = self.current.lock().await;
        let finished = match current.as_mut() {
            Some(playback) => playback.child.try_wait().ok().flatten().is_some(),
            None => return None,
        };
        if finished {
            *current = None;
            return None;
        }
        current.as_ref().map(|p| p.address.clone())
    }
}

impl Default for A2dpPlayer {
    fn default() -> Self {
        Self::new(DEFAULT_PLAYER)
    }
}
