//! HID usage codes and bindable key actions
//!
//! [`KeyCode`] covers the keyboard usage page (0x00-0xA4), the modifiers
//! (0xE0-0xE7) and the vendor media range (0xE8-0xFB). Every other byte is
//! not a key code and is rejected when decoding a configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! key_codes {
    ($($name:ident = $code:literal,)*) => {
        /// HID keyboard usage code
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum KeyCode {
            $($name = $code,)*
        }

        impl KeyCode {
            /// Every defined code, ascending
            pub const ALL: &'static [KeyCode] = &[$(KeyCode::$name,)*];

            /// Display name of the code
            pub fn name(self) -> &'static str {
                match self {
                    $(KeyCode::$name => stringify!($name),)*
                }
            }

            /// Look up a code; `None` for bytes outside the table
            pub fn from_u8(code: u8) -> Option<KeyCode> {
                match code {
                    $($code => Some(KeyCode::$name),)*
                    _ => None,
                }
            }
        }
    };
}

key_codes! {
    None = 0x00, ErrorRollOver = 0x01, PostFail = 0x02, ErrorUndefined = 0x03,
    A = 0x04, B = 0x05, C = 0x06, D = 0x07,
    E = 0x08, F = 0x09, G = 0x0A, H = 0x0B,
    I = 0x0C, J = 0x0D, K = 0x0E, L = 0x0F,
    M = 0x10, N = 0x11, O = 0x12, P = 0x13,
    Q = 0x14, R = 0x15, S = 0x16, T = 0x17,
    U = 0x18, V = 0x19, W = 0x1A, X = 0x1B,
    Y = 0x1C, Z = 0x1D, Kb1 = 0x1E, Kb2 = 0x1F,
    Kb3 = 0x20, Kb4 = 0x21, Kb5 = 0x22, Kb6 = 0x23,
    Kb7 = 0x24, Kb8 = 0x25, Kb9 = 0x26, Kb0 = 0x27,
    Enter = 0x28, Escape = 0x29, BSpace = 0x2A, Tab = 0x2B,
    Space = 0x2C, Minus = 0x2D, Equal = 0x2E, LBracket = 0x2F,
    RBracket = 0x30, Bslash = 0x31, NonUsHash = 0x32, SColon = 0x33,
    Quote = 0x34, Grave = 0x35, Comma = 0x36, Dot = 0x37,
    Slash = 0x38, CapsLock = 0x39, F1 = 0x3A, F2 = 0x3B,
    F3 = 0x3C, F4 = 0x3D, F5 = 0x3E, F6 = 0x3F,
    F7 = 0x40, F8 = 0x41, F9 = 0x42, F10 = 0x43,
    F11 = 0x44, F12 = 0x45, PScreen = 0x46, ScrollLock = 0x47,
    Pause = 0x48, Insert = 0x49, Home = 0x4A, PgUp = 0x4B,
    Delete = 0x4C, End = 0x4D, PgDown = 0x4E, Right = 0x4F,
    Left = 0x50, Down = 0x51, Up = 0x52, NumLock = 0x53,
    KpSlash = 0x54, KpAsterisk = 0x55, KpMinus = 0x56, KpPlus = 0x57,
    KpEnter = 0x58, Kp1 = 0x59, Kp2 = 0x5A, Kp3 = 0x5B,
    Kp4 = 0x5C, Kp5 = 0x5D, Kp6 = 0x5E, Kp7 = 0x5F,
    Kp8 = 0x60, Kp9 = 0x61, Kp0 = 0x62, KpDot = 0x63,
    NonUsBslash = 0x64, Application = 0x65, Power = 0x66, KpEqual = 0x67,
    F13 = 0x68, F14 = 0x69, F15 = 0x6A, F16 = 0x6B,
    F17 = 0x6C, F18 = 0x6D, F19 = 0x6E, F20 = 0x6F,
    F21 = 0x70, F22 = 0x71, F23 = 0x72, F24 = 0x73,
    Execute = 0x74, Help = 0x75, Menu = 0x76, Select = 0x77,
    Stop = 0x78, Again = 0x79, Undo = 0x7A, Cut = 0x7B,
    Copy = 0x7C, Paste = 0x7D, Find = 0x7E, Mute = 0x7F,
    VolUp = 0x80, VolDown = 0x81, LockingCapsLock = 0x82, LockingNumLock = 0x83,
    LockingScrollLock = 0x84, KpComma = 0x85, KpEqualSign = 0x86, Intl1 = 0x87,
    Intl2 = 0x88, Intl3 = 0x89, Intl4 = 0x8A, Intl5 = 0x8B,
    Intl6 = 0x8C, Intl7 = 0x8D, Intl8 = 0x8E, Intl9 = 0x8F,
    Lang1 = 0x90, Lang2 = 0x91, Lang3 = 0x92, Lang4 = 0x93,
    Lang5 = 0x94, Lang6 = 0x95, Lang7 = 0x96, Lang8 = 0x97,
    Lang9 = 0x98, AltErase = 0x99, SysReq = 0x9A, Cancel = 0x9B,
    Clear = 0x9C, Prior = 0x9D, Return = 0x9E, Separator = 0x9F,
    Out = 0xA0, Oper = 0xA1, ClearAgain = 0xA2, CrSel = 0xA3,
    ExSel = 0xA4,
    // modifiers
    LCtrl = 0xE0, LShift = 0xE1, LAlt = 0xE2, LGui = 0xE3,
    RCtrl = 0xE4, RShift = 0xE5, RAlt = 0xE6, RGui = 0xE7,
    // media, vendor range
    MediaPlayPause = 0xE8, MediaStopCD = 0xE9, MediaPreviousSong = 0xEA, MediaNextSong = 0xEB,
    MediaEjectCD = 0xEC, MediaVolUp = 0xED, MediaVolDown = 0xEE, MediaMute = 0xEF,
    MediaWWW = 0xF0, MediaBack = 0xF1, MediaForward = 0xF2, MediaStop = 0xF3,
    MediaFind = 0xF4, MediaScrollUp = 0xF5, MediaScrollDown = 0xF6, MediaEdit = 0xF7,
    MediaSleep = 0xF8, MediaCoffee = 0xF9, MediaRefresh = 0xFA, MediaCalc = 0xFB,
}

impl Default for KeyCode {
    fn default() -> Self {
        KeyCode::None
    }
}

impl KeyCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Modifier keys (sent as a bitfield in a HID report)
    pub fn is_modifier(self) -> bool {
        (KeyCode::LCtrl..=KeyCode::RGui).contains(&self)
    }

    /// Vendor media range
    pub fn is_media(self) -> bool {
        self >= KeyCode::MediaPlayPause
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common spellings that differ from the table names
fn alias(name: &str) -> Option<KeyCode> {
    Some(match name {
        "esc" => KeyCode::Escape,
        "backspace" | "bksp" => KeyCode::BSpace,
        "ret" => KeyCode::Enter,
        "semicolon" => KeyCode::SColon,
        "backslash" => KeyCode::Bslash,
        "ctrl" | "lcontrol" => KeyCode::LCtrl,
        "shift" => KeyCode::LShift,
        "alt" => KeyCode::LAlt,
        "win" | "super" | "lwin" => KeyCode::LGui,
        "del" => KeyCode::Delete,
        "pgdn" | "pagedown" => KeyCode::PgDown,
        "pageup" => KeyCode::PgUp,
        "printscreen" => KeyCode::PScreen,
        _ => {
            // bare digits map to the top row
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(d @ '1'..='9'), None) => KeyCode::from_u8(0x1E + (d as u8 - b'1'))?,
                (Some('0'), None) => KeyCode::Kb0,
                _ => return None,
            }
        }
    })
}

// ============================================================================
// MixedKey
// ============================================================================

/// Action bound to one physical key of a matrix board
///
/// The board keymap shares one slot between keyboard usages and vendor
/// actions, so the slot carries a kind tag next to the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MixedKey {
    #[default]
    None,
    Keyboard(KeyCode),
    Custom(u8),
    Mouse(u8),
    Media(u8),
}

/// Kind tags of the `[kind, code]` wire pair
pub mod kind {
    pub const NONE: u8 = 0;
    pub const KEYBOARD: u8 = 1;
    pub const CUSTOM: u8 = 2;
    pub const MOUSE: u8 = 3;
    pub const MEDIA: u8 = 4;
}

impl MixedKey {
    /// Encode to the `[kind, code]` wire pair.
    pub fn to_wire(self) -> [u8; 2] {
        match self {
            MixedKey::None => [kind::NONE, 0],
            MixedKey::Keyboard(k) => [kind::KEYBOARD, k.code()],
            MixedKey::Custom(c) => [kind::CUSTOM, c],
            MixedKey::Mouse(c) => [kind::MOUSE, c],
            MixedKey::Media(c) => [kind::MEDIA, c],
        }
    }

    /// Decode a `[kind, code]` pair; `None` for an unknown kind, a keyboard
    /// code outside the table, or a non-zero code on an empty slot
    pub fn from_wire(pair: [u8; 2]) -> Option<Self> {
        let [k, code] = pair;
        match k {
            kind::NONE if code == 0 => Some(MixedKey::None),
            kind::KEYBOARD => KeyCode::from_u8(code).map(MixedKey::Keyboard),
            kind::CUSTOM => Some(MixedKey::Custom(code)),
            kind::MOUSE => Some(MixedKey::Mouse(code)),
            kind::MEDIA => Some(MixedKey::Media(code)),
            _ => None,
        }
    }

    /// Plain keycode binding; `KeyCode::None` maps to an empty slot
    pub fn from_key(key: KeyCode) -> Self {
        if key == KeyCode::None {
            MixedKey::None
        } else {
            MixedKey::Keyboard(key)
        }
    }
}

impl fmt::Display for MixedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixedKey::None => write!(f, "None"),
            MixedKey::Keyboard(k) => write!(f, "{k}"),
            MixedKey::Custom(c) => write!(f, "Custom({c})"),
            MixedKey::Mouse(c) => write!(f, "Mouse({c})"),
            MixedKey::Media(c) => write!(f, "Media({c})"),
        }
    }
}

/// Error type for parsing a [`KeyCode`] or [`MixedKey`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseKeyError {
    UnknownKey(String),
    InvalidCode(String),
}

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey(name) => write!(f, "unknown key: \"{name}\""),
            Self::InvalidCode(s) => write!(f, "invalid key code: \"{s}\""),
        }
    }
}

impl std::error::Error for ParseKeyError {}

fn parse_code(s: &str) -> Result<u8, ParseKeyError> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| ParseKeyError::InvalidCode(s.to_string()))
}

impl FromStr for KeyCode {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") || s.starts_with("0X") {
            let code = parse_code(s)?;
            return KeyCode::from_u8(code).ok_or_else(|| ParseKeyError::InvalidCode(s.into()));
        }
        let lower = s.to_ascii_lowercase();
        KeyCode::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(&lower))
            .or_else(|| alias(&lower))
            .ok_or_else(|| ParseKeyError::UnknownKey(s.to_string()))
    }
}

impl FromStr for MixedKey {
    type Err = ParseKeyError;

    /// `A`, `Esc`, `0x29`, `None`, `Custom(3)`, `Mouse(1)`, `Media(0x0A)`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        for (prefix, ctor) in [
            ("custom", MixedKey::Custom as fn(u8) -> MixedKey),
            ("mouse", MixedKey::Mouse),
            ("media", MixedKey::Media),
        ] {
            if s.len() > prefix.len()
                && s.is_char_boundary(prefix.len())
                && s[..prefix.len()].eq_ignore_ascii_case(prefix)
                && s[prefix.len()..].starts_with('(')
            {
                let inner = s[prefix.len()..]
                    .trim_start_matches('(')
                    .trim_end_matches(')');
                return Ok(ctor(parse_code(inner)?));
            }
        }
        s.parse::<KeyCode>().map(MixedKey::from_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_bounds() {
        assert_eq!(KeyCode::ALL.len(), 0xA5 + 28);
        assert_eq!(KeyCode::from_u8(0x04), Some(KeyCode::A));
        assert_eq!(KeyCode::from_u8(0x1D), Some(KeyCode::Z));
        assert_eq!(KeyCode::from_u8(0xA4), Some(KeyCode::ExSel));
        assert_eq!(KeyCode::from_u8(0xA5), None);
        assert_eq!(KeyCode::from_u8(0xDF), None);
        assert_eq!(KeyCode::from_u8(0xE0), Some(KeyCode::LCtrl));
        assert_eq!(KeyCode::from_u8(0xFB), Some(KeyCode::MediaCalc));
        assert_eq!(KeyCode::from_u8(0xFC), None);
    }

    #[test]
    fn test_codes_match_discriminants() {
        for k in KeyCode::ALL {
            assert_eq!(KeyCode::from_u8(k.code()), Some(*k));
        }
    }

    #[test]
    fn test_modifiers() {
        assert!(KeyCode::LCtrl.is_modifier());
        assert!(KeyCode::RGui.is_modifier());
        assert!(!KeyCode::MediaPlayPause.is_modifier());
        assert!(KeyCode::MediaCalc.is_media());
    }

    #[test]
    fn parse_key_names() {
        assert_eq!("A".parse::<KeyCode>().unwrap(), KeyCode::A);
        assert_eq!("a".parse::<KeyCode>().unwrap(), KeyCode::A);
        assert_eq!("Esc".parse::<KeyCode>().unwrap(), KeyCode::Escape);
        assert_eq!("f12".parse::<KeyCode>().unwrap(), KeyCode::F12);
        assert_eq!("1".parse::<KeyCode>().unwrap(), KeyCode::Kb1);
        assert_eq!("0x2C".parse::<KeyCode>().unwrap(), KeyCode::Space);
        assert!("0xA5".parse::<KeyCode>().is_err());
        assert!(matches!(
            "Hyper".parse::<KeyCode>(),
            Err(ParseKeyError::UnknownKey(_))
        ));
    }

    #[test]
    fn parse_mixed_keys() {
        assert_eq!("None".parse::<MixedKey>().unwrap(), MixedKey::None);
        assert_eq!(
            "Z".parse::<MixedKey>().unwrap(),
            MixedKey::Keyboard(KeyCode::Z)
        );
        assert_eq!("Custom(3)".parse::<MixedKey>().unwrap(), MixedKey::Custom(3));
        assert_eq!("mouse(1)".parse::<MixedKey>().unwrap(), MixedKey::Mouse(1));
        assert_eq!("Media(0x0A)".parse::<MixedKey>().unwrap(), MixedKey::Media(10));
        assert!("Mouse(300)".parse::<MixedKey>().is_err());
    }

    #[test]
    fn display_parse_roundtrip() {
        for key in [
            MixedKey::None,
            MixedKey::Keyboard(KeyCode::LBracket),
            MixedKey::Custom(7),
            MixedKey::Media(2),
        ] {
            assert_eq!(key.to_string().parse::<MixedKey>().unwrap(), key);
        }
    }

    #[test]
    fn wire_pairs() {
        assert_eq!(MixedKey::Keyboard(KeyCode::A).to_wire(), [1, 0x04]);
        assert_eq!(MixedKey::from_wire([4, 9]), Some(MixedKey::Media(9)));
        assert_eq!(MixedKey::from_wire([0, 0]), Some(MixedKey::None));
        assert_eq!(MixedKey::from_wire([0, 3]), None);
        assert_eq!(MixedKey::from_wire([1, 0xA5]), None);
        assert_eq!(MixedKey::from_wire([5, 0]), None);
    }
}
