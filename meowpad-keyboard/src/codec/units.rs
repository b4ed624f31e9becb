//! UI <-> device unit conversion shared by the family codecs

use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::config::ACTION_SLOTS;
use crate::error::KeyboardError;
use crate::keycode::KeyCode;

/// Percentage field scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PercentScale {
    /// Device stores half-percent steps (0..=200)
    Doubled,
    /// Device stores the percentage as-is (0..=100)
    Direct,
}

impl PercentScale {
    fn factor(self) -> u8 {
        match self {
            PercentScale::Doubled => 2,
            PercentScale::Direct => 1,
        }
    }

    pub(crate) fn encode(self, field: &str, ui: u8) -> Result<u8, KeyboardError> {
        if ui > 100 {
            return Err(KeyboardError::invalid_field(
                field,
                format!("{ui}% is above 100%"),
            ));
        }
        Ok(ui * self.factor())
    }

    pub(crate) fn decode(self, field: &str, wire: u8) -> Result<u8, KeyboardError> {
        let factor = self.factor();
        if wire > 100 * factor {
            return Err(KeyboardError::malformed(format!(
                "{field}: stored value {wire} out of range"
            )));
        }
        Ok(wire / factor)
    }
}

/// Debounce window scaling: the device counts in `1/factor` ms ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JitterScale(pub u16);

impl JitterScale {
    pub(crate) fn encode(self, ms: u16) -> Result<u16, KeyboardError> {
        ms.checked_mul(self.0).ok_or_else(|| {
            KeyboardError::invalid_field(
                "jitter_ms",
                format!("{ms} ms exceeds {} ms", u16::MAX / self.0),
            )
        })
    }

    pub(crate) fn decode(self, wire: u16) -> u16 {
        wire / self.0
    }
}

pub(crate) const MAX_BRIGHTNESS: u8 = 100;

pub(crate) fn encode_brightness(ui: u8) -> Result<u8, KeyboardError> {
    if ui > MAX_BRIGHTNESS || ui % 2 != 0 {
        return Err(KeyboardError::invalid_field(
            "max_brightness",
            format!("{ui} must be an even value in 0..=100"),
        ));
    }
    Ok(ui / 2)
}

pub(crate) fn decode_brightness(wire: u8) -> Result<u8, KeyboardError> {
    if wire > MAX_BRIGHTNESS / 2 {
        return Err(KeyboardError::malformed(format!(
            "max_brightness: stored value {wire} out of range"
        )));
    }
    Ok(wire * 2)
}

pub(crate) fn decode_bool(field: &str, wire: u8) -> Result<bool, KeyboardError> {
    match wire {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(KeyboardError::malformed(format!(
            "{field}: {other} is not a boolean"
        ))),
    }
}

/// Pack an action list into the fixed slot array, zero padded
pub(crate) fn encode_actions(
    field: &str,
    actions: &[KeyCode],
) -> Result<[u8; ACTION_SLOTS], KeyboardError> {
    if actions.len() > ACTION_SLOTS {
        return Err(KeyboardError::invalid_field(
            field,
            format!("{} actions, at most {ACTION_SLOTS}", actions.len()),
        ));
    }
    let mut slots = [0u8; ACTION_SLOTS];
    for (i, key) in actions.iter().enumerate() {
        if *key == KeyCode::None {
            return Err(KeyboardError::invalid_field(field, "None is not an action"));
        }
        if actions[..i].contains(key) {
            return Err(KeyboardError::invalid_field(
                field,
                format!("duplicate action {key}"),
            ));
        }
        slots[i] = key.code();
    }
    Ok(slots)
}

/// Unpack a slot array; empty slots are dropped
pub(crate) fn decode_actions(
    field: &str,
    slots: &[u8; ACTION_SLOTS],
) -> Result<Vec<KeyCode>, KeyboardError> {
    slots
        .iter()
        .filter(|&&code| code != 0)
        .map(|&code| {
            KeyCode::from_u8(code).ok_or_else(|| {
                KeyboardError::malformed(format!("{field}: unknown key code 0x{code:02X}"))
            })
        })
        .collect()
}

pub(crate) fn check_len(field: &str, actual: usize, expected: usize) -> Result<(), KeyboardError> {
    if actual != expected {
        return Err(KeyboardError::invalid_field(
            field,
            format!("expected {expected} entries, got {actual}"),
        ));
    }
    Ok(())
}

/// Read a whole fixed-size block; the length must match exactly
pub(crate) fn read_block<T>(bytes: &[u8], what: &str) -> Result<T, KeyboardError>
where
    T: FromBytes + KnownLayout + Immutable,
{
    T::read_from_bytes(bytes).map_err(|_| {
        KeyboardError::malformed(format!(
            "{what} is {} bytes, got {}",
            std::mem::size_of::<T>(),
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_scales() {
        assert_eq!(PercentScale::Doubled.encode("p", 50).unwrap(), 100);
        assert_eq!(PercentScale::Doubled.decode("p", 101).unwrap(), 50);
        assert_eq!(PercentScale::Direct.encode("p", 50).unwrap(), 50);
        assert!(PercentScale::Doubled.encode("p", 101).is_err());
        assert!(matches!(
            PercentScale::Doubled.decode("p", 201),
            Err(KeyboardError::MalformedConfig(_))
        ));
        assert!(matches!(
            PercentScale::Direct.decode("p", 101),
            Err(KeyboardError::MalformedConfig(_))
        ));
    }

    #[test]
    fn test_jitter_scale() {
        let scale = JitterScale(8);
        assert_eq!(scale.encode(5).unwrap(), 40);
        assert_eq!(scale.decode(40), 5);
        assert!(matches!(
            scale.encode(u16::MAX / 8 + 1),
            Err(KeyboardError::InvalidField { .. })
        ));
        assert_eq!(JitterScale(1).encode(120).unwrap(), 120);
    }

    #[test]
    fn test_brightness() {
        assert_eq!(encode_brightness(100).unwrap(), 50);
        assert_eq!(decode_brightness(50).unwrap(), 100);
        assert!(encode_brightness(51).is_err());
        assert!(encode_brightness(102).is_err());
        assert!(decode_brightness(51).is_err());
    }

    #[test]
    fn test_actions() {
        let slots = encode_actions("a", &[KeyCode::Z, KeyCode::LShift]).unwrap();
        assert_eq!(slots, [0x1D, 0xE1, 0, 0, 0, 0]);
        assert_eq!(
            decode_actions("a", &slots).unwrap(),
            vec![KeyCode::Z, KeyCode::LShift]
        );

        assert!(encode_actions("a", &[KeyCode::Z; 7]).is_err());
        assert!(encode_actions("a", &[KeyCode::Z, KeyCode::Z]).is_err());
        assert!(encode_actions("a", &[KeyCode::None]).is_err());
        assert!(matches!(
            decode_actions("a", &[0xB0, 0, 0, 0, 0, 0]),
            Err(KeyboardError::MalformedConfig(_))
        ));
    }

    #[test]
    fn test_bool() {
        assert!(!decode_bool("b", 0).unwrap());
        assert!(decode_bool("b", 1).unwrap());
        assert!(decode_bool("b", 2).is_err());
    }
}
