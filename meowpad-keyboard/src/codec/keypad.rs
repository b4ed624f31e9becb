//! Layout pieces shared by the three- and four-key pads

use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use super::units::{decode_actions, encode_actions, JitterScale, PercentScale};
use crate::config::{KeyConfig, Rgb, ACTION_SLOTS};
use crate::error::KeyboardError;

pub(super) const PERCENT: PercentScale = PercentScale::Doubled;
pub(super) const JITTER: JitterScale = JitterScale(8);

/// One analog key as stored by the keypad firmware
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub(super) struct KeypadKeyRaw {
    press: u8,
    release: u8,
    dead_zone: u8,
    actions: [u8; ACTION_SLOTS],
}

impl KeypadKeyRaw {
    pub(super) fn encode(index: usize, key: &KeyConfig) -> Result<Self, KeyboardError> {
        let field = |name: &str| format!("keys[{index}].{name}");
        Ok(Self {
            press: PERCENT.encode(&field("press"), key.press)?,
            release: PERCENT.encode(&field("release"), key.release)?,
            dead_zone: PERCENT.encode(&field("dead_zone"), key.dead_zone)?,
            actions: encode_actions(&field("actions"), &key.actions)?,
        })
    }

    pub(super) fn decode(&self, index: usize) -> Result<KeyConfig, KeyboardError> {
        let field = |name: &str| format!("keys[{index}].{name}");
        Ok(KeyConfig {
            press: PERCENT.decode(&field("press"), self.press)?,
            release: PERCENT.decode(&field("release"), self.release)?,
            dead_zone: PERCENT.decode(&field("dead_zone"), self.dead_zone)?,
            actions: decode_actions(&field("actions"), &self.actions)?,
        })
    }
}

pub(super) fn encode_keys<const N: usize>(
    keys: &[KeyConfig],
) -> Result<[KeypadKeyRaw; N], KeyboardError> {
    super::units::check_len("keys", keys.len(), N)?;
    let mut raw = [KeypadKeyRaw::new_zeroed(); N];
    for (i, (slot, key)) in raw.iter_mut().zip(keys).enumerate() {
        *slot = KeypadKeyRaw::encode(i, key)?;
    }
    Ok(raw)
}

pub(super) fn decode_keys(raw: &[KeypadKeyRaw]) -> Result<Vec<KeyConfig>, KeyboardError> {
    raw.iter().enumerate().map(|(i, k)| k.decode(i)).collect()
}

pub(super) fn encode_colors<const N: usize>(colors: &[Rgb]) -> Result<[U32; N], KeyboardError> {
    super::units::check_len("colors", colors.len(), N)?;
    let mut raw = [U32::new(0); N];
    for (slot, color) in raw.iter_mut().zip(colors) {
        *slot = U32::new(color.to_u32());
    }
    Ok(raw)
}

pub(super) fn decode_colors(raw: &[U32]) -> Vec<Rgb> {
    raw.iter().map(|c| Rgb::from_u32(c.get())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::KeyCode;

    #[test]
    fn test_key_layout() {
        assert_eq!(std::mem::size_of::<KeypadKeyRaw>(), 9);

        let key = KeyConfig::new(50, 25, 10, vec![KeyCode::A]);
        let raw = KeypadKeyRaw::encode(0, &key).unwrap();
        assert_eq!(raw.as_bytes(), &[100, 50, 20, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(raw.decode(0).unwrap(), key);
    }

    #[test]
    fn test_invalid_field_names_key() {
        let key = KeyConfig::new(50, 101, 10, vec![]);
        match KeypadKeyRaw::encode(2, &key) {
            Err(KeyboardError::InvalidField { field, .. }) => assert_eq!(field, "keys[2].release"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_colors_wire_form() {
        let raw = encode_colors::<2>(&[Rgb::new(0x12, 0x34, 0x56), Rgb::WHITE]).unwrap();
        assert_eq!(raw[0].as_bytes(), &[0x56, 0x34, 0x12, 0x00]);
        assert_eq!(decode_colors(&raw)[1], Rgb::WHITE);
        assert!(encode_colors::<3>(&[Rgb::WHITE]).is_err());
    }
}
