//! Error types for BlueZ, obexd and BlueALSA operations.

use testhost_core::GatewayError;
use thiserror::Error;

/// Errors raised while talking to the Bluetooth stack.
#[derive(Error, Debug)]
pub enum BluezError {
    /// Bluetooth adapter not found.
    #[error("Bluetooth adapter not found")]
    AdapterNotFound,

    /// Device not found or address not parseable.
    #[error("Bluetooth device not found: {0}")]
    DeviceNotFound(String),

    /// An agent is already registered on this gateway.
    #[error("Agent already registered")]
    AgentAlreadyRegistered,

    /// No agent is registered on this gateway.
    #[error("No agent registered")]
    AgentNotRegistered,

    /// BlueZ D-Bus error.
    #[error("BlueZ error: {0}")]
    BlueZ(String),

    /// obexd D-Bus error.
    #[error("OBEX error: {0}")]
    Obex(String),

    /// Audio player process error.
    #[error("Audio player error: {0}")]
    Player(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bluer::Error> for BluezError {
    fn from(e: bluer::Error) -> Self {
        match e.kind {
            bluer::ErrorKind::NotFound => BluezError::DeviceNotFound(e.message),
            _ => BluezError::BlueZ(e.to_string()),
        }
    }
}

impl From<zbus::Error> for BluezError {
    fn from(e: zbus::Error) -> Self {
        BluezError::Obex(e.to_string())
    }
}

impl From<BluezError> for GatewayError {
    fn from(e: BluezError) -> Self {
        match e {
            BluezError::AdapterNotFound => GatewayError::AdapterNotFound,
            BluezError::DeviceNotFound(addr) => GatewayError::DeviceNotFound(addr),
            BluezError::Obex(msg) => GatewayError::Obex(msg),
            BluezError::Player(msg) => GatewayError::Player(msg),
            BluezError::Io(e) => GatewayError::Io(e),
            other => GatewayError::BlueZ(other.to_string()),
        }
    }
}

/// Convenience Result type for Bluetooth operations.
pub type Result<T> = std::result::Result<T, BluezError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats() {
        let err = BluezError::AdapterNotFound;
        assert!(err.to_string().contains("adapter not found"));

        let err = BluezError::Player("aplay exited".to_string());
        assert!(err.to_string().contains("Audio player"));
        assert!(err.to_string().contains("aplay exited"));

        let err = BluezError::Obex("org.bluez.obex.Error.Failed".to_string());
        assert!(err.to_string().contains("OBEX"));
    }

    #[test]
    fn converts_to_gateway_error() {
        let err: GatewayError = BluezError::DeviceNotFound("00:11:22:33:44:55".to_string()).into();
        assert!(matches!(err, GatewayError::DeviceNotFound(_)));

        let err: GatewayError = BluezError::AgentNotRegistered.into();
        match err {
            GatewayError::BlueZ(msg) => assert!(msg.contains("No agent registered")),
            other => panic!("unexpected {:?}", other),
        }

        let err: GatewayError = BluezError::BlueZ("Page Timeout".to_string()).into();
        match err {
            GatewayError::BlueZ(msg) => assert!(msg.contains("Page Timeout")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "aplay");
        let err: BluezError = io_err.into();
        assert!(matches!(err, BluezError::Io(_)));
        let err: GatewayError = err.into();
        assert!(matches!(err, GatewayError::Io(_)));
    }
}
