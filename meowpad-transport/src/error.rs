//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Communication timeout")]
    Timeout,

    #[error("Unknown device {vid:04X}:{pid:04X}")]
    UnknownDevice { vid: u16, pid: u16 },

    #[error("Invalid response: expected packet {expected}, got {actual}")]
    InvalidResponse { expected: u8, actual: u8 },

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Packet body too large: {0} bytes")]
    PacketTooLarge(usize),

    // HID-specific errors
    #[error("HID error: {0}")]
    HidError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether the error means the handle can no longer be used
    pub fn is_disconnect(&self) -> bool {
        matches!(self, TransportError::Disconnected)
    }
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::HidError(msg)
        }
    }
}
