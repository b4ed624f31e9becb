//! Device status and telemetry types

use serde::{Deserialize, Serialize};

use crate::error::KeyboardError;

/// Live state of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyState {
    #[default]
    Pressed = 0,
    Released = 1,
    Calibrating = 2,
}

impl TryFrom<u16> for KeyState {
    type Error = KeyboardError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyState::Pressed),
            1 => Ok(KeyState::Released),
            2 => Ok(KeyState::Calibrating),
            other => Err(KeyboardError::UnexpectedResponse(format!(
                "unknown key state {other}"
            ))),
        }
    }
}

/// Real-time reading of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyRtStatus {
    /// Raw hall sensor ADC value
    pub adc_value: u16,
    /// ADC value after linearization
    pub linear_value: u16,
    /// Travel in percent
    pub press_percentage: u8,
    pub key_state: KeyState,
}

/// Learned sensor range of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyHallConfig {
    pub adc_min: u16,
    pub adc_max: u16,
    pub hall_middle: u16,
}

/// Per-subsystem health flags from `GetStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Key config loaded
    pub key: bool,
    /// Light config loaded; `None` on families without LEDs
    pub light: Option<bool>,
    /// Hall sensors calibrated
    pub hall: bool,
    /// Key output enabled
    pub enabled: bool,
}

/// Name and firmware version reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub firmware_version: String,
}

/// Calibration progress of one key as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyCalibration {
    /// Sensor range learned (keypads: the key is not calibrating)
    pub calibrated: bool,
    pub calibrating: bool,
    pub adc_value: u16,
    pub press_percentage: u8,
}

// ============================================================================
// Reply parsing
// ============================================================================

/// Big-endian reader over a reply body
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    what: &'static str,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8], what: &'static str) -> Self {
        Self { data, pos: 0, what }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], KeyboardError> {
        let slice = self.data.get(self.pos..self.pos + n).ok_or_else(|| {
            KeyboardError::UnexpectedResponse(format!(
                "{} reply too short ({} bytes)",
                self.what,
                self.data.len()
            ))
        })?;
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, KeyboardError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, KeyboardError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn flag(&mut self) -> Result<bool, KeyboardError> {
        Ok(self.u8()? != 0)
    }
}

/// Keypad debug record: adc, linear, press, state as big-endian u16
pub(crate) fn parse_keypad_debug(data: &[u8], keys: usize) -> Result<Vec<KeyRtStatus>, KeyboardError> {
    let mut r = Reader::new(data, "Debug");
    (0..keys)
        .map(|_| {
            Ok(KeyRtStatus {
                adc_value: r.u16()?,
                linear_value: r.u16()?,
                press_percentage: r.u16()?.min(u8::MAX as u16) as u8,
                key_state: KeyState::try_from(r.u16()?)?,
            })
        })
        .collect()
}

/// Board debug page: 8 keys of adc u16, linear u16, press u8, state u8
pub(crate) fn parse_board_debug_page(data: &[u8]) -> Result<Vec<KeyRtStatus>, KeyboardError> {
    let mut r = Reader::new(data, "Debug");
    (0..BOARD_PAGE_KEYS)
        .map(|_| {
            Ok(KeyRtStatus {
                adc_value: r.u16()?,
                linear_value: r.u16()?,
                press_percentage: r.u8()?,
                key_state: KeyState::try_from(r.u8()? as u16)?,
            })
        })
        .collect()
}

/// Hall config records: adc_max, adc_min, middle as big-endian u16
pub(crate) fn parse_hall_config(data: &[u8], keys: usize) -> Result<Vec<KeyHallConfig>, KeyboardError> {
    let mut r = Reader::new(data, "GetHallConfig");
    (0..keys)
        .map(|_| {
            let adc_max = r.u16()?;
            let adc_min = r.u16()?;
            Ok(KeyHallConfig {
                adc_min,
                adc_max,
                hall_middle: r.u16()?,
            })
        })
        .collect()
}

/// `GetStatus` body: keypads with LEDs send four flags, boards three
pub(crate) fn parse_status(data: &[u8], has_lighting: bool) -> Result<DeviceStatus, KeyboardError> {
    let mut r = Reader::new(data, "GetStatus");
    let key = r.flag()?;
    let light = if has_lighting { Some(r.flag()?) } else { None };
    Ok(DeviceStatus {
        key,
        light,
        hall: r.flag()?,
        enabled: r.flag()?,
    })
}

/// Keys per board `Debug` / `GetHallConfig` page
pub(crate) const BOARD_PAGE_KEYS: usize = 8;
/// Keys per board `CalibrateKeyStatus` / `DebugKeyState` half
pub(crate) const BOARD_HALF_KEYS: usize = 32;
/// Values per board `DebugValue` page
pub(crate) const BOARD_VALUE_PAGES: [usize; 3] = [30, 30, 4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypad_debug() {
        let data = [
            0x08, 0x00, 0x01, 0x00, 0x00, 0x32, 0x00, 0x00, // key 0 pressed at 50%
            0x07, 0xFF, 0x00, 0x10, 0x00, 0x00, 0x00, 0x02, // key 1 calibrating
        ];
        let keys = parse_keypad_debug(&data, 2).unwrap();
        assert_eq!(keys[0].adc_value, 0x0800);
        assert_eq!(keys[0].press_percentage, 50);
        assert_eq!(keys[0].key_state, KeyState::Pressed);
        assert_eq!(keys[1].key_state, KeyState::Calibrating);

        assert!(parse_keypad_debug(&data, 3).is_err());
    }

    #[test]
    fn test_board_debug_page() {
        let mut data = Vec::new();
        for i in 0..8u8 {
            data.extend_from_slice(&[0x01, i, 0x00, i, i * 10, 1]);
        }
        let keys = parse_board_debug_page(&data).unwrap();
        assert_eq!(keys.len(), 8);
        assert_eq!(keys[3].adc_value, 0x0103);
        assert_eq!(keys[3].press_percentage, 30);
        assert_eq!(keys[3].key_state, KeyState::Released);
    }

    #[test]
    fn test_bad_key_state() {
        let data = [0, 0, 0, 0, 0, 0, 0, 9];
        assert!(matches!(
            parse_keypad_debug(&data, 1),
            Err(KeyboardError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_hall_config_order() {
        let data = [0x0F, 0x00, 0x01, 0x00, 0x08, 0x00];
        let hall = parse_hall_config(&data, 1).unwrap();
        assert_eq!(hall[0].adc_max, 0x0F00);
        assert_eq!(hall[0].adc_min, 0x0100);
        assert_eq!(hall[0].hall_middle, 0x0800);
    }

    #[test]
    fn test_status_layouts() {
        let pad = parse_status(&[1, 0, 1, 1], true).unwrap();
        assert_eq!(pad.light, Some(false));
        assert!(pad.hall && pad.enabled);

        let board = parse_status(&[1, 0, 1], false).unwrap();
        assert_eq!(board.light, None);
        assert!(!board.hall);
        assert!(board.enabled);
    }
}
