//! Typed configuration model
//!
//! These are the values callers read and edit. Percentages are whole
//! percent (0-100), times are milliseconds. Device units only exist inside
//! the codec.

use std::fmt;
use std::str::FromStr;

use meowpad_transport::DeviceFamily;
use serde::{Deserialize, Serialize};

use crate::keycode::{KeyCode, MixedKey};

/// Key code slots per keypad key on the wire
pub const ACTION_SLOTS: usize = 6;

// ============================================================================
// Keys
// ============================================================================

/// Analog trigger settings and binding of one keypad key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Actuation point, percent of travel
    pub press: u8,
    /// Release point, percent of travel
    pub release: u8,
    /// Top dead zone, percent of travel
    pub dead_zone: u8,
    /// Codes reported when the key fires; at most six, never `KeyCode::None`
    pub actions: Vec<KeyCode>,
}

impl KeyConfig {
    pub fn new(press: u8, release: u8, dead_zone: u8, actions: Vec<KeyCode>) -> Self {
        Self {
            press,
            release,
            dead_zone,
            actions,
        }
    }
}

/// Analog trigger settings of one board key (bindings live in the layers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardKeyConfig {
    pub press: u8,
    pub release: u8,
    pub dead_zone: u8,
    pub release_dead_zone: u8,
}

impl Default for BoardKeyConfig {
    fn default() -> Self {
        Self {
            press: 8,
            release: 8,
            dead_zone: 15,
            release_dead_zone: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeKeyConfig {
    pub keys: Vec<KeyConfig>,
    /// Codes sent by the side button
    pub side_button: Vec<KeyCode>,
    /// Jitter elimination window (ms)
    pub jitter_ms: u16,
    pub continuous_report: bool,
    pub kalman_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FourKeyConfig {
    pub keys: Vec<KeyConfig>,
    pub jitter_ms: u16,
    pub continuous_report: bool,
    pub kalman_filter: bool,
    /// High-speed report mode
    pub high_speed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub keys: Vec<BoardKeyConfig>,
    pub jitter_ms: u16,
    pub continuous_report: bool,
    pub kalman_filter: bool,
    pub high_speed: bool,
    /// Base layer bindings, one per key
    pub normal_layer: Vec<MixedKey>,
    /// Bindings while Fn is held, one per key
    pub fn_layer: Vec<MixedKey>,
}

/// Full key configuration of one device family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Configuration {
    ThreeKey(ThreeKeyConfig),
    FourKey(FourKeyConfig),
    Board(BoardConfig),
}

impl Configuration {
    /// Factory defaults for a family
    pub fn default_for(family: DeviceFamily) -> Self {
        let keypad_key = |key: KeyCode, press: u8, dead_zone: u8| KeyConfig {
            press,
            release: press,
            dead_zone,
            actions: vec![key],
        };
        match family {
            DeviceFamily::ThreeKey => Configuration::ThreeKey(ThreeKeyConfig {
                keys: [KeyCode::Z, KeyCode::X, KeyCode::C]
                    .into_iter()
                    .map(|k| keypad_key(k, 5, 10))
                    .collect(),
                side_button: vec![KeyCode::Escape],
                jitter_ms: 15,
                continuous_report: false,
                kalman_filter: true,
            }),
            DeviceFamily::FourKey => Configuration::FourKey(FourKeyConfig {
                keys: [KeyCode::Z, KeyCode::X, KeyCode::C, KeyCode::V]
                    .into_iter()
                    .map(|k| keypad_key(k, 4, 7))
                    .collect(),
                jitter_ms: 15,
                continuous_report: false,
                kalman_filter: true,
                high_speed: true,
            }),
            DeviceFamily::Board(n) => {
                let (normal_layer, fn_layer) = default_layers(n);
                Configuration::Board(BoardConfig {
                    keys: vec![BoardKeyConfig::default(); n],
                    jitter_ms: 15,
                    continuous_report: false,
                    kalman_filter: true,
                    high_speed: true,
                    normal_layer,
                    fn_layer,
                })
            }
        }
    }

    /// Family this configuration is shaped for
    ///
    /// For boards the key count is taken from the key list.
    pub fn family(&self) -> DeviceFamily {
        match self {
            Configuration::ThreeKey(_) => DeviceFamily::ThreeKey,
            Configuration::FourKey(_) => DeviceFamily::FourKey,
            Configuration::Board(b) => DeviceFamily::Board(b.keys.len()),
        }
    }

    pub fn key_count(&self) -> usize {
        match self {
            Configuration::ThreeKey(c) => c.keys.len(),
            Configuration::FourKey(c) => c.keys.len(),
            Configuration::Board(c) => c.keys.len(),
        }
    }

    pub fn jitter_ms(&self) -> u16 {
        match self {
            Configuration::ThreeKey(c) => c.jitter_ms,
            Configuration::FourKey(c) => c.jitter_ms,
            Configuration::Board(c) => c.jitter_ms,
        }
    }

    pub fn as_board(&self) -> Option<&BoardConfig> {
        match self {
            Configuration::Board(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_board_mut(&mut self) -> Option<&mut BoardConfig> {
        match self {
            Configuration::Board(b) => Some(b),
            _ => None,
        }
    }
}

/// PURE64 default keymap, base layer (ANSI 60% with arrows)
const DEFAULT_NORMAL_LAYER: [u8; 64] = [
    41, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 45, 46, 42, // Esc 1..0 - = Bksp
    43, 20, 26, 8, 21, 23, 28, 24, 12, 18, 19, 47, 48, 49, // Tab Q..P [ ] \
    57, 4, 22, 7, 9, 10, 11, 13, 14, 15, 51, 52, 40, // Caps A..L ; ' Enter
    225, 29, 27, 6, 25, 5, 17, 16, 54, 55, 56, 229, 82, 76, // LShift Z../ RShift Up Del
    224, 227, 226, 44, 230, 0, 80, 81, 79, // LCtrl Win LAlt Space RAlt Fn Left Down Right
];

/// Fn layer: grave and the F-row over the number row
const DEFAULT_FN_LAYER_HEAD: [u8; 13] = [53, 58, 59, 60, 61, 62, 63, 64, 65, 66, 67, 68, 69];

fn default_layers(n: usize) -> (Vec<MixedKey>, Vec<MixedKey>) {
    let to_key = |code: &u8| MixedKey::from_key(KeyCode::from_u8(*code).unwrap_or_default());
    let mut normal: Vec<MixedKey> = DEFAULT_NORMAL_LAYER.iter().take(n).map(to_key).collect();
    normal.resize(n, MixedKey::None);
    let mut fn_layer: Vec<MixedKey> = DEFAULT_FN_LAYER_HEAD.iter().take(n).map(to_key).collect();
    fn_layer.resize(n, MixedKey::None);
    (normal, fn_layer)
}

// ============================================================================
// Lighting
// ============================================================================

/// RGB color; the wire form is a `u32` `0x00RRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The top (alpha) byte is ignored
    pub fn from_u32(value: u32) -> Self {
        let [_, r, g, b] = value.to_be_bytes();
        Self { r, g, b }
    }

    pub fn to_u32(self) -> u32 {
        u32::from_be_bytes([0, self.r, self.g, self.b])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return Err(format!("expected RRGGBB, got \"{s}\""));
        }
        let value = u32::from_str_radix(hex, 16).map_err(|e| format!("{s}: {e}"))?;
        Ok(Self::from_u32(value))
    }
}

/// LED effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LightingMode {
    Off = 0,
    Calibration = 1,
    Error = 2,
    Solid = 3,
    Rainbow = 4,
    RainbowFlow = 5,
    PressRadiance = 6,
    BreatheGlow = 7,
    BreatheGlowAsync = 8,
    RainDrop = 9,
    TapToGlow = 10,
    SpeedLight = 11,
}

impl LightingMode {
    pub const ALL: [LightingMode; 12] = [
        LightingMode::Off,
        LightingMode::Calibration,
        LightingMode::Error,
        LightingMode::Solid,
        LightingMode::Rainbow,
        LightingMode::RainbowFlow,
        LightingMode::PressRadiance,
        LightingMode::BreatheGlow,
        LightingMode::BreatheGlowAsync,
        LightingMode::RainDrop,
        LightingMode::TapToGlow,
        LightingMode::SpeedLight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LightingMode::Off => "off",
            LightingMode::Calibration => "calibration",
            LightingMode::Error => "error",
            LightingMode::Solid => "solid",
            LightingMode::Rainbow => "rainbow",
            LightingMode::RainbowFlow => "rainbow-flow",
            LightingMode::PressRadiance => "press-radiance",
            LightingMode::BreatheGlow => "breathe-glow",
            LightingMode::BreatheGlowAsync => "breathe-glow-async",
            LightingMode::RainDrop => "rain-drop",
            LightingMode::TapToGlow => "tap-to-glow",
            LightingMode::SpeedLight => "speed-light",
        }
    }
}

impl TryFrom<u8> for LightingMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        LightingMode::ALL
            .get(value as usize)
            .copied()
            .ok_or(value)
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LightingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        LightingMode::ALL
            .iter()
            .copied()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| format!("unknown lighting mode: {s}"))
    }
}

/// Effect parameters of the four-key pad
///
/// Only the fields of the active mode matter to the firmware; the rest are
/// kept so a read-modify-write does not disturb them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightEffects {
    /// Mode used while the pad sleeps
    pub sleep_mode: LightingMode,
    pub rainbow_flow_speed: u16,
    pub color_change_rate: u8,
    pub flow_delay: bool,
    pub rainbow_speed: u16,
    pub breathing_speed: u16,
    pub max_keep_time: u16,
    pub min_keep_time: u16,
    pub breaths_before_color_switch: u8,
    pub rain_drop_speed: u16,
    pub random_rain_chance: u16,
    pub tap_to_glow_speed: u16,
    pub max_lum_freeze_time: u8,
    pub change_color_when_pressed: bool,
    pub random_color_mode: bool,
    pub speed_light_speed: u16,
    pub attenuation_speed: u16,
    pub increase_difficulty: u8,
    pub low_speed_color: Rgb,
    pub high_speed_color: Rgb,
}

impl Default for LightEffects {
    fn default() -> Self {
        Self {
            sleep_mode: LightingMode::Off,
            rainbow_flow_speed: 100,
            color_change_rate: 1,
            flow_delay: true,
            rainbow_speed: 2,
            breathing_speed: 8,
            max_keep_time: 500,
            min_keep_time: 0,
            breaths_before_color_switch: 3,
            rain_drop_speed: 2,
            random_rain_chance: 400,
            tap_to_glow_speed: 10,
            max_lum_freeze_time: 50,
            change_color_when_pressed: true,
            random_color_mode: false,
            speed_light_speed: 2,
            attenuation_speed: 80,
            increase_difficulty: 24,
            low_speed_color: Rgb::WHITE,
            high_speed_color: Rgb::RED,
        }
    }
}

/// LED settings of families with RGB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightingConfig {
    /// One color per LED
    pub colors: Vec<Rgb>,
    pub mode: LightingMode,
    /// Brightness cap in percent; even values only
    pub max_brightness: u8,
    /// Idle time before sleep (s)
    pub sleep_time: u16,
    /// Present exactly for the four-key pad
    pub effects: Option<LightEffects>,
}

impl LightingConfig {
    /// Factory defaults; `None` for families without LEDs
    pub fn default_for(family: DeviceFamily) -> Option<Self> {
        match family {
            DeviceFamily::ThreeKey => Some(Self {
                colors: vec![Rgb::WHITE; 3],
                mode: LightingMode::Solid,
                max_brightness: 100,
                sleep_time: 120,
                effects: None,
            }),
            DeviceFamily::FourKey => Some(Self {
                colors: vec![Rgb::WHITE; 4],
                mode: LightingMode::BreatheGlow,
                max_brightness: 100,
                sleep_time: 120,
                effects: Some(LightEffects::default()),
            }),
            DeviceFamily::Board(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_family_shape() {
        for family in [
            DeviceFamily::ThreeKey,
            DeviceFamily::FourKey,
            DeviceFamily::Board(64),
        ] {
            let cfg = Configuration::default_for(family);
            assert_eq!(cfg.family(), family);
            assert_eq!(cfg.key_count(), family.key_count());
            assert_eq!(
                LightingConfig::default_for(family).map(|l| l.colors.len()),
                family.has_lighting().then(|| family.led_count())
            );
        }
    }

    #[test]
    fn test_default_board_layers() {
        let cfg = Configuration::default_for(DeviceFamily::Board(64));
        let board = cfg.as_board().unwrap();
        assert_eq!(board.normal_layer[0], MixedKey::Keyboard(KeyCode::Escape));
        assert_eq!(board.normal_layer[59], MixedKey::Keyboard(KeyCode::RAlt));
        assert_eq!(board.normal_layer[60], MixedKey::None); // Fn position
        assert_eq!(board.normal_layer[63], MixedKey::Keyboard(KeyCode::Right));
        assert_eq!(board.fn_layer[1], MixedKey::Keyboard(KeyCode::F1));
        assert_eq!(board.fn_layer[13], MixedKey::None);
    }

    #[test]
    fn test_rgb_conversions() {
        let c = Rgb::from_u32(0xFF12_3456);
        assert_eq!(c, Rgb::new(0x12, 0x34, 0x56));
        assert_eq!(c.to_u32(), 0x0012_3456);
        assert_eq!("#123456".parse::<Rgb>().unwrap(), c);
        assert_eq!(c.to_string(), "#123456");
        assert!("12345".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_lighting_mode_names() {
        assert_eq!(LightingMode::try_from(11), Ok(LightingMode::SpeedLight));
        assert_eq!(LightingMode::try_from(12), Err(12));
        assert_eq!(
            "rain_drop".parse::<LightingMode>().unwrap(),
            LightingMode::RainDrop
        );
        for mode in LightingMode::ALL {
            assert_eq!(LightingMode::try_from(mode as u8), Ok(mode));
        }
    }
}
