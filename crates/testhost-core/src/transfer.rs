//! OPP file transfer and A2DP streaming / media control.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::device::{A2dpRole, Address};
use crate::error::{CoordinatorError, PreconditionError, Result};
use crate::traits::{AdapterGateway, InteractionPort};

/// Outcome of an OPP send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    Queued,
    Rejected,
    Unknown,
    Error,
}

impl TransferStatus {
    /// Map an obexd transfer state.
    pub fn from_daemon(status: &str) -> Self {
        match status {
            "complete" => TransferStatus::Complete,
            "queued" | "active" | "suspended" => TransferStatus::Queued,
            "error" | "rejected" => TransferStatus::Rejected,
            _ => TransferStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Complete => "complete",
            TransferStatus::Queued => "queued",
            TransferStatus::Rejected => "rejected",
            TransferStatus::Unknown => "unknown",
            TransferStatus::Error => "error",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AVRCP command sent to a media source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCommand {
    Play,
    Pause,
    Next,
    Previous,
    Rewind,
}

impl MediaCommand {
    pub const ALL: [MediaCommand; 5] = [
        MediaCommand::Play,
        MediaCommand::Pause,
        MediaCommand::Next,
        MediaCommand::Previous,
        MediaCommand::Rewind,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCommand::Play => "play",
            MediaCommand::Pause => "pause",
            MediaCommand::Next => "next",
            MediaCommand::Previous => "previous",
            MediaCommand::Rewind => "rewind",
        }
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaCommand {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        MediaCommand::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| CoordinatorError::UnknownAction(s.to_string()))
    }
}

/// Streaming state, used to gate start/stop controls.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming { address: Address, file: PathBuf },
}

/// Coordinates OPP and A2DP work for the front end.
pub struct TransferCoordinator {
    gateway: Arc<dyn AdapterGateway>,
    port: Arc<dyn InteractionPort>,
    accepted_extensions: Vec<String>,
    stream: Mutex<StreamState>,
}

impl TransferCoordinator {
    pub fn new(
        gateway: Arc<dyn AdapterGateway>,
        port: Arc<dyn InteractionPort>,
        accepted_extensions: Vec<String>,
    ) -> Self {
        Self {
            gateway,
            port,
            accepted_extensions: accepted_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            stream: Mutex::new(StreamState::Idle),
        }
    }

    /// Query the device's A2DP role. Never cached.
    pub async fn resolve_role(&self, address: &Address) -> Result<A2dpRole> {
        Ok(self.gateway.get_a2dp_role_for_device(address).await?)
    }

    /// Role of a connected device; `None` role for disconnected ones.
    pub async fn resolve_role_if_connected(&self, address: &Address) -> Result<A2dpRole> {
        if !self.gateway.is_device_connected(address).await? {
            return Ok(A2dpRole::None);
        }
        self.resolve_role(address).await
    }

    fn is_accepted_audio(&self, file: &Path) -> bool {
        file.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.accepted_extensions.iter().any(|a| a.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Start streaming `file` to `address`.
    pub async fn start_stream(&self, address: &Address, file: &Path) -> Result<()> {
        if !file.is_file() || !self.is_accepted_audio(file) {
            self.port
                .notify_warning(
                    "Invalid Audio File",
                    "Please select a valid audio file to stream.",
                )
                .await;
            return Err(if file.is_file() {
                PreconditionError::UnsupportedFormat(file.to_path_buf()).into()
            } else {
                PreconditionError::FileNotFound(file.to_path_buf()).into()
            });
        }

        if !self.gateway.is_device_connected(address).await? {
            self.port
                .notify_warning("Streaming", &format!("{} is not connected.", address))
                .await;
            return Err(PreconditionError::DeviceNotConnected(address.clone()).into());
        }

        let role = self.resolve_role(address).await?;
        if role != A2dpRole::Sink {
            self.port
                .notify_warning(
                    "Streaming",
                    &format!("{} is not an audio sink (role: {}).", address, role),
                )
                .await;
            return Err(PreconditionError::WrongRole(address.clone(), role).into());
        }

        info!("Starting A2DP stream to {} with {}", address, file.display());
        if !self.gateway.start_a2dp_stream(address, file).await? {
            error!("Failed to start A2DP streaming with file: {}", file.display());
            self.port
                .notify_error("Streaming Failed", "Failed to start streaming.")
                .await;
            return Err(CoordinatorError::StreamStartFailed(file.to_path_buf()));
        }

        *self.stream.lock().await = StreamState::Streaming {
            address: address.clone(),
            file: file.to_path_buf(),
        };
        Ok(())
    }

    /// Stop the current stream. Errors are surfaced, not retried.
    pub async fn stop_stream(&self) -> Result<()> {
        info!("Stopping A2DP stream");
        match self.gateway.stop_a2dp_stream().await {
            Ok(()) => {
                *self.stream.lock().await = StreamState::Idle;
                Ok(())
            }
            Err(e) => {
                error!("Failed to stop A2DP streaming: {}", e);
                self.port
                    .notify_error("Stop Streaming Failed", "Failed to stop A2DP streaming.")
                    .await;
                Err(CoordinatorError::StreamStop(e))
            }
        }
    }

    pub async fn stream_state(&self) -> StreamState {
        self.stream.lock().await.clone()
    }

    /// Send an AVRCP command to a connected source.
    ///
    /// A failed command is logged only; the role lookup is what can fail.
    pub async fn send_media_command(&self, command: MediaCommand, address: &Address) -> Result<()> {
        let role = self.resolve_role_if_connected(address).await?;
        if role != A2dpRole::Source {
            self.port
                .notify_warning(
                    "Media Control",
                    &format!("{} is not a connected audio source (role: {}).", address, role),
                )
                .await;
            return Err(PreconditionError::WrongRole(address.clone(), role).into());
        }

        info!("Sending media command {} to {}", command, address);
        if let Err(e) = self.gateway.media_control(command, address).await {
            warn!("Media command {} to {} failed: {}", command, address, e);
        }
        Ok(())
    }

    /// Push a file over OPP.
    pub async fn send_file(&self, address: Option<&Address>, file: Option<&Path>) -> Result<TransferStatus> {
        let (address, file) = match (address, file) {
            (Some(address), Some(file)) => (address, file),
            (address, _) => {
                self.port
                    .notify_warning("OPP", "Please select a device and a file.")
                    .await;
                return Err(if address.is_none() {
                    PreconditionError::MissingDevice.into()
                } else {
                    PreconditionError::MissingFile.into()
                });
            }
        };

        if !file.is_file() {
            self.port
                .notify_error("Invalid File", "The selected file does not exist.")
                .await;
            return Err(PreconditionError::FileNotFound(file.to_path_buf()).into());
        }

        info!("Sending {} to {}", file.display(), address);
        let status = match self.gateway.send_file(address, file).await {
            Ok(state) => TransferStatus::from_daemon(&state),
            Err(e) => {
                error!("OPP send to {} failed: {}", address, e);
                TransferStatus::Error
            }
        };
        info!("OPP transfer to {} finished with status {}", address, status);

        match status {
            TransferStatus::Complete => {
                self.port
                    .notify_info("Success", "File sent successfully!")
                    .await
            }
            TransferStatus::Queued => {
                self.port
                    .notify_info("In Progress", "File transfer is queued. Please wait...")
                    .await
            }
            TransferStatus::Unknown => {
                self.port
                    .notify_warning("Unknown", "File transfer status is unknown.")
                    .await
            }
            TransferStatus::Rejected | TransferStatus::Error => {
                self.port
                    .notify_warning("Failed", "File transfer failed or was rejected.")
                    .await
            }
        }
        Ok(status)
    }

    /// Wait for an incoming OPP transfer confirmed through the port.
    pub async fn receive_file(&self) -> Result<Option<PathBuf>> {
        info!("Waiting for incoming OPP transfer");
        match self.gateway.receive_file(self.port.clone()).await {
            Ok(Some(path)) => {
                self.port
                    .notify_info(
                        "File Received",
                        &format!("File received successfully:\n{}", path.display()),
                    )
                    .await;
                Ok(Some(path))
            }
            Ok(None) => {
                self.port
                    .notify_warning(
                        "File Transfer",
                        "No file received or user declined the transfer.",
                    )
                    .await;
                Ok(None)
            }
            Err(e) => {
                error!("Error receiving file: {}", e);
                self.port
                    .notify_error(
                        "Error",
                        &format!("An error occurred during file reception:\n{}", e),
                    )
                    .await;
                Err(CoordinatorError::Reception(e))
            }
        }
    }
}
