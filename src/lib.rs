// Meowpad configuration tool - shared library
// Application settings and the remote release manifest

pub mod config;
pub mod firmware_api;

pub use config::{AppConfig, ConfigError};
pub use firmware_api::{compare_version, ApiError, FirmwareEdition, FirmwareRelease, VersionInfo};
