//! Keyboard interface error types

use meowpad_transport::TransportError;
use thiserror::Error;

/// Errors from device and configuration operations
#[derive(Error, Debug)]
pub enum KeyboardError {
    /// Session invalidated before or during the operation
    #[error("Device disconnected")]
    DeviceDisconnected,

    /// No matching device at connect time
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// USB signature is not in the registry
    #[error("Unknown device {vid:04X}:{pid:04X}")]
    UnknownDevice { vid: u16, pid: u16 },

    /// Raw bytes do not form a valid configuration block
    #[error("Malformed config: {0}")]
    MalformedConfig(String),

    /// Typed value cannot be encoded
    #[error("Invalid field `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// Bootloader rejected a command
    #[error("IAP transfer failed: {0}")]
    IapTransferFailed(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Feature not supported by this device
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Device returned unexpected response
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Other transport layer error
    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeyboardError {
    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        KeyboardError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        KeyboardError::MalformedConfig(reason.into())
    }
}

impl From<TransportError> for KeyboardError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Disconnected => KeyboardError::DeviceDisconnected,
            TransportError::DeviceNotFound(path) => KeyboardError::DeviceNotFound(path),
            TransportError::UnknownDevice { vid, pid } => KeyboardError::UnknownDevice { vid, pid },
            TransportError::Timeout => KeyboardError::Timeout,
            other => KeyboardError::Transport(other),
        }
    }
}
