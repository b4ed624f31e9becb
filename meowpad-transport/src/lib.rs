//! Transport layer for Meowpad/Meowboard hall-effect keypads and keyboards
//!
//! This crate owns everything below the typed configuration model:
//!
//! - USB signature registry and family classification
//! - Packet framing over 64-byte HID reports
//! - A serialized request/response channel on top of any [`Transport`]
//! - hidapi-backed transport and discovery
//! - An in-memory [`MockTransport`] for exercising the upper layers

pub mod channel;
pub mod device_registry;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod types;

mod discovery;
mod hid;

pub use channel::PacketChannel;
pub use device_registry::{classify, is_bootloader, DeviceSignature, SIGNATURES};
pub use discovery::{DeviceDiscovery, HidDiscovery};
pub use error::TransportError;
pub use hid::HidTransport;
pub use mock::MockTransport;
pub use protocol::{IapCommand, IapPacket, Packet, PacketId};
pub use types::{DeviceDescriptor, DeviceFamily, DeviceMode, TransportDeviceInfo};

use async_trait::async_trait;
use std::sync::Arc;

/// The raw report I/O every backend implements
///
/// Implementations move single HID reports only. Packet framing, acks and
/// request serialization live in [`PacketChannel`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one output report
    ///
    /// # Arguments
    /// * `report` - Report bytes including the leading report ID
    async fn write_report(&self, report: &[u8]) -> Result<(), TransportError>;

    /// Read one input report
    ///
    /// # Arguments
    /// * `timeout_ms` - Upper bound on the wait
    ///
    /// # Returns
    /// Report bytes (no report ID). `TransportError::Timeout` when nothing
    /// arrived in time.
    async fn read_report(&self, timeout_ms: u32) -> Result<Vec<u8>, TransportError>;

    /// Get device information
    fn device_info(&self) -> &TransportDeviceInfo;

    /// Check if transport is still connected
    async fn is_connected(&self) -> bool;

    /// Close the transport; later I/O fails with `Disconnected`
    async fn close(&self) -> Result<(), TransportError>;
}

/// Type alias for a shared transport
pub type BoxedTransport = Arc<dyn Transport>;
