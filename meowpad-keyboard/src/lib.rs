//! Typed configuration and device sessions for Meowpad/Meowboard devices
//!
//! This crate sits on top of `meowpad-transport` and provides:
//!
//! - The KeyCode table and key binding types
//! - Typed per-family configuration with factory defaults
//! - The binary codec between typed configs and the firmware's blocks
//! - Offline raw config validation
//! - [`Meowpad`] sessions and the single-active-session [`SessionManager`]
//! - Calibration, bootloader flashing and `.pcf` presets

pub mod calibration;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod iap;
pub mod keycode;
pub mod preset;
pub mod session;
pub mod status;
pub mod validator;

pub use calibration::{CalibrationPhase, CalibrationSession, KeyCalibrationState, KeyProgress};
pub use codec::{codec_for, ConfigCodec, LightingCodec};
pub use config::{
    BoardConfig, BoardKeyConfig, Configuration, FourKeyConfig, KeyConfig, LightEffects,
    LightingConfig, LightingMode, Rgb, ThreeKeyConfig,
};
pub use device::{ApplyOutcome, Meowpad};
pub use error::KeyboardError;
pub use iap::{IapProgrammer, IapProgress, IapState};
pub use keycode::{KeyCode, MixedKey, ParseKeyError};
pub use preset::DevicePreset;
pub use session::SessionManager;
pub use status::{DeviceInfo, DeviceStatus, KeyCalibration, KeyHallConfig, KeyRtStatus, KeyState};

// Re-export the transport types callers need to pick a device
pub use meowpad_transport::{DeviceDescriptor, DeviceFamily, DeviceMode};
