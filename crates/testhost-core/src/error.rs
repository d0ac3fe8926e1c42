//! Error types for the test host coordinator.

use std::path::PathBuf;

use thiserror::Error;

use crate::device::{A2dpRole, Address};

/// Primary error type for coordinator operations.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// Device action name not present in the action table.
    #[error("Unknown device action: {0}")]
    UnknownAction(String),

    /// Pairing request type not present in the request table.
    #[error("Unknown pairing request type: {0}")]
    UnknownRequestType(String),

    /// Capability name not understood by the agent.
    #[error("Unknown agent capability: {0}")]
    UnknownCapability(String),

    /// Device reference could not be turned into an address.
    #[error("Malformed device reference: {0}")]
    MalformedDeviceRef(String),

    /// Agent registration refused or failed.
    #[error("Agent registration failed: {0}")]
    Registration(String),

    /// No agent is currently registered.
    #[error("No agent is registered")]
    NotRegistered,

    /// A pairing flow for this address is already in progress.
    #[error("Pairing already in progress for {0}")]
    PairingInProgress(Address),

    /// Discovery is already running.
    #[error("Device discovery is already running")]
    DiscoveryInProgress,

    /// Checked before contacting the gateway.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The gateway accepted the request but reported failure.
    #[error("Failed to start A2DP streaming with file: {}", .0.display())]
    StreamStartFailed(PathBuf),

    /// The gateway could not stop the stream.
    #[error("Failed to stop A2DP streaming: {0}")]
    StreamStop(#[source] GatewayError),

    /// Incoming file reception failed.
    #[error("File reception failed: {0}")]
    Reception(#[source] GatewayError),

    /// Underlying gateway call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Conditions checked locally before any gateway primitive is invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("No device selected")]
    MissingDevice,

    #[error("No file selected")]
    MissingFile,

    #[error("File does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Device {0} is not connected")]
    DeviceNotConnected(Address),

    /// Streaming needs a sink, media control needs a source.
    #[error("Device {0} has A2DP role {1}")]
    WrongRole(Address, A2dpRole),
}

/// Errors raised by an adapter gateway implementation.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Bluetooth adapter not found.
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Device not known to the daemon.
    #[error("Bluetooth device not found: {0}")]
    DeviceNotFound(String),

    /// BlueZ D-Bus error.
    #[error("BlueZ error: {0}")]
    BlueZ(String),

    /// obexd D-Bus error.
    #[error("OBEX error: {0}")]
    Obex(String),

    /// Audio player process error.
    #[error("Audio player error: {0}")]
    Player(String),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = CoordinatorError::UnknownAction("reboot".to_string());
        assert!(err.to_string().contains("reboot"));

        let err = CoordinatorError::PairingInProgress(Address::new("aa:bb:cc:dd:ee:ff"));
        assert!(err.to_string().contains("AA:BB:CC:DD:EE:FF"));

        let err: CoordinatorError =
            PreconditionError::FileNotFound(PathBuf::from("/tmp/missing.wav")).into();
        assert!(err.to_string().contains("Precondition failed"));
        assert!(err.to_string().contains("missing.wav"));
    }

    #[test]
    fn gateway_error_conversion() {
        let err: CoordinatorError = GatewayError::Timeout.into();
        assert!(matches!(err, CoordinatorError::Gateway(GatewayError::Timeout)));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: GatewayError = io_err.into();
        assert!(matches!(err, GatewayError::Io(_)));
    }
}
