//! Common types for the transport layer

use serde::{Deserialize, Serialize};

/// Device information from the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Device path or identifier (transport-specific)
    pub device_path: String,
    /// Serial number if available
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

/// Hardware family a device belongs to
///
/// The family decides which configuration layout and command set apply.
/// It is assigned once from the USB signature and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeviceFamily {
    /// Meowpad SE, three keys
    ThreeKey,
    /// Meowpad, four keys
    FourKey,
    /// Matrix keyboard with `N` keys
    Board(usize),
}

impl DeviceFamily {
    /// Number of physical keys
    pub fn key_count(&self) -> usize {
        match self {
            DeviceFamily::ThreeKey => 3,
            DeviceFamily::FourKey => 4,
            DeviceFamily::Board(n) => *n,
        }
    }

    /// Number of addressable LEDs (0 when the family has no RGB)
    pub fn led_count(&self) -> usize {
        match self {
            DeviceFamily::ThreeKey => 3,
            DeviceFamily::FourKey => 4,
            DeviceFamily::Board(_) => 0,
        }
    }

    pub fn has_lighting(&self) -> bool {
        self.led_count() > 0
    }

    /// Keypads expose flat debug values, boards use paged reports
    pub fn is_board(&self) -> bool {
        matches!(self, DeviceFamily::Board(_))
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceFamily::ThreeKey => write!(f, "3K"),
            DeviceFamily::FourKey => write!(f, "4K"),
            DeviceFamily::Board(n) => write!(f, "Board({n})"),
        }
    }
}

/// Whether the device runs its application firmware or the IAP bootloader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceMode {
    #[default]
    Normal,
    Bootloader,
}

/// One physical candidate produced by discovery
///
/// Immutable once listed. A descriptor becomes stale when the device drops
/// off the bus; opening a stale descriptor fails with `DeviceNotFound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Platform HID path
    pub path: String,
    pub vid: u16,
    pub pid: u16,
    /// USB interface number (-1 when the backend does not report it)
    pub interface_number: i32,
    pub family: DeviceFamily,
    pub mode: DeviceMode,
    /// Marketing name from the signature table
    pub name: String,
    /// Firmware version, filled by a probing enumeration
    pub firmware_version: Option<String>,
    pub serial: Option<String>,
}

impl DeviceDescriptor {
    pub fn is_bootloader(&self) -> bool {
        self.mode == DeviceMode::Bootloader
    }

    /// Transport-level view of this descriptor
    pub fn transport_info(&self) -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: self.vid,
            pid: self.pid,
            device_path: self.path.clone(),
            serial: self.serial.clone(),
            product_name: Some(self.name.clone()),
        }
    }
}

impl std::fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {:04X}:{:04X} if{} {}",
            self.name, self.family, self.vid, self.pid, self.interface_number, self.path
        )?;
        if self.is_bootloader() {
            write!(f, " (bootloader)")?;
        }
        Ok(())
    }
}
