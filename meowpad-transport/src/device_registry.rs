//! Device registry - family classification by USB signature
//!
//! Every supported device is identified by its (VID, PID) pair. Devices whose
//! signature is not in [`SIGNATURES`] are never offered for selection.

use crate::error::TransportError;
use crate::types::{DeviceFamily, DeviceMode};

/// Meowpad vendor ID
pub const MEOWPAD_VID: u16 = 0x5D3E;
/// Meowpad (4 keys)
pub const PID_MEOWPAD: u16 = 0xFE07;
/// Meowpad SE (3 keys)
pub const PID_MEOWPAD_SE: u16 = 0xFE17;
/// Meowpad IAP bootloader
pub const PID_MEOWPAD_IAP: u16 = 0xFE08;

/// Meowboard vendor ID
pub const MEOWBOARD_VID: u16 = 0x2E3C;
/// Meowboard PURE64
pub const PID_MEOWBOARD_PURE64: u16 = 0x5745;

/// Key count of the PURE64 matrix
pub const PURE64_KEY_COUNT: usize = 64;

/// Static description of one supported USB signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSignature {
    pub vid: u16,
    pub pid: u16,
    pub family: DeviceFamily,
    pub mode: DeviceMode,
    pub name: &'static str,
}

/// All signatures this driver understands
pub const SIGNATURES: &[DeviceSignature] = &[
    DeviceSignature {
        vid: MEOWPAD_VID,
        pid: PID_MEOWPAD,
        family: DeviceFamily::FourKey,
        mode: DeviceMode::Normal,
        name: "Meowpad",
    },
    DeviceSignature {
        vid: MEOWPAD_VID,
        pid: PID_MEOWPAD_SE,
        family: DeviceFamily::ThreeKey,
        mode: DeviceMode::Normal,
        name: "Meowpad SE",
    },
    DeviceSignature {
        vid: MEOWPAD_VID,
        pid: PID_MEOWPAD_IAP,
        family: DeviceFamily::FourKey,
        mode: DeviceMode::Bootloader,
        name: "Meowpad IAP",
    },
    DeviceSignature {
        vid: MEOWBOARD_VID,
        pid: PID_MEOWBOARD_PURE64,
        family: DeviceFamily::Board(PURE64_KEY_COUNT),
        mode: DeviceMode::Normal,
        name: "Meowboard PURE64",
    },
];

/// Find the signature entry for a VID/PID pair
pub fn lookup(vid: u16, pid: u16) -> Option<&'static DeviceSignature> {
    SIGNATURES.iter().find(|s| s.vid == vid && s.pid == pid)
}

/// Classify a VID/PID pair into a device family
pub fn classify(vid: u16, pid: u16) -> Result<DeviceFamily, TransportError> {
    lookup(vid, pid)
        .map(|s| s.family)
        .ok_or(TransportError::UnknownDevice { vid, pid })
}

/// Check if the pair belongs to an IAP bootloader
#[inline]
pub fn is_bootloader(vid: u16, pid: u16) -> bool {
    lookup(vid, pid).is_some_and(|s| s.mode == DeviceMode::Bootloader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_signatures() {
        assert_eq!(
            classify(MEOWPAD_VID, PID_MEOWPAD).unwrap(),
            DeviceFamily::FourKey
        );
        assert_eq!(
            classify(MEOWPAD_VID, PID_MEOWPAD_SE).unwrap(),
            DeviceFamily::ThreeKey
        );
        assert_eq!(
            classify(MEOWBOARD_VID, PID_MEOWBOARD_PURE64).unwrap(),
            DeviceFamily::Board(64)
        );
    }

    #[test]
    fn test_unknown_signature() {
        assert!(matches!(
            classify(0x3151, 0x5030),
            Err(TransportError::UnknownDevice {
                vid: 0x3151,
                pid: 0x5030
            })
        ));
        // right PID, wrong vendor
        assert!(classify(MEOWBOARD_VID, PID_MEOWPAD).is_err());
    }

    #[test]
    fn test_bootloader_pid() {
        assert!(is_bootloader(MEOWPAD_VID, PID_MEOWPAD_IAP));
        assert!(!is_bootloader(MEOWPAD_VID, PID_MEOWPAD));
        assert!(!is_bootloader(0, 0));
    }

    #[test]
    fn test_signatures_unique() {
        for (i, a) in SIGNATURES.iter().enumerate() {
            for b in &SIGNATURES[i + 1..] {
                assert!(!(a.vid == b.vid && a.pid == b.pid));
            }
        }
    }
}
