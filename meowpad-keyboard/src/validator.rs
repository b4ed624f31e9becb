//! Structural checks for raw config buffers
//!
//! Runs offline: a buffer from a file is checked the same way whether or not
//! a device is attached. Only the layout is checked (length, enum ranges,
//! booleans, key code membership), not whether the values make sense together.

use std::path::Path;

use meowpad_transport::DeviceFamily;
use tracing::debug;

use crate::codec;
use crate::error::KeyboardError;

/// Check a raw config (key block followed by the light block, if any)
pub fn validate(family: DeviceFamily, bytes: &[u8]) -> Result<(), KeyboardError> {
    codec::decode_raw(family, bytes)
        .map(|_| ())
        .map_err(|e| match e {
            KeyboardError::MalformedConfig(_) => e,
            other => KeyboardError::MalformedConfig(other.to_string()),
        })
}

/// Boolean form of [`validate`]
pub fn is_valid(family: DeviceFamily, bytes: &[u8]) -> bool {
    match validate(family, bytes) {
        Ok(()) => true,
        Err(e) => {
            debug!("Raw config rejected for {}: {}", family, e);
            false
        }
    }
}

/// Read a raw config export and validate it before handing it out
pub fn load_raw_file(family: DeviceFamily, path: &Path) -> Result<Vec<u8>, KeyboardError> {
    let bytes = std::fs::read(path)?;
    validate(family, &bytes)?;
    Ok(bytes)
}
