use meowpad_transport::DeviceFamily;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::keypad::{self, KeypadKeyRaw, JITTER};
use super::units::{decode_bool, decode_brightness, encode_brightness, read_block};
use super::{ConfigCodec, LightingCodec};
use crate::config::{
    Configuration, FourKeyConfig, LightEffects, LightingConfig, LightingMode, Rgb,
};
use crate::error::KeyboardError;

const KEYS: usize = 4;

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct KeyBlock {
    keys: [KeypadKeyRaw; KEYS],
    jitter: U16,
    continuous_report: u8,
    kalman_filter: u8,
    high_speed: u8,
}

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct LightBlock {
    colors: [U32; KEYS],
    mode: u8,
    sleep_mode: u8,
    max_brightness: u8,
    sleep_time: U16,
    rainbow_flow_speed: U16,
    color_change_rate: u8,
    flow_delay: u8,
    rainbow_speed: U16,
    breathing_speed: U16,
    max_keep_time: U16,
    min_keep_time: U16,
    breaths_before_color_switch: u8,
    rain_drop_speed: U16,
    random_rain_chance: U16,
    tap_to_glow_speed: U16,
    max_lum_freeze_time: u8,
    change_color_when_pressed: u8,
    random_color_mode: u8,
    speed_light_speed: U16,
    attenuation_speed: U16,
    increase_difficulty: u8,
    low_speed_color: U32,
    high_speed_color: U32,
}

fn decode_mode(field: &str, wire: u8) -> Result<LightingMode, KeyboardError> {
    LightingMode::try_from(wire)
        .map_err(|v| KeyboardError::malformed(format!("{field}: unknown lighting mode {v}")))
}

/// Meowpad four-key pad
#[derive(Debug, Clone, Copy, Default)]
pub struct FourKeyCodec;

impl ConfigCodec for FourKeyCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::FourKey
    }

    fn key_block_size(&self) -> usize {
        std::mem::size_of::<KeyBlock>()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Configuration, KeyboardError> {
        let block: KeyBlock = read_block(bytes, "4K key block")?;
        Ok(Configuration::FourKey(FourKeyConfig {
            keys: keypad::decode_keys(&block.keys)?,
            jitter_ms: JITTER.decode(block.jitter.get()),
            continuous_report: decode_bool("continuous_report", block.continuous_report)?,
            kalman_filter: decode_bool("kalman_filter", block.kalman_filter)?,
            high_speed: decode_bool("high_speed", block.high_speed)?,
        }))
    }

    fn encode(&self, config: &Configuration) -> Result<Vec<u8>, KeyboardError> {
        let Configuration::FourKey(cfg) = config else {
            return Err(KeyboardError::invalid_field(
                "family",
                format!("{} config given to the 4K codec", config.family()),
            ));
        };
        let block = KeyBlock {
            keys: keypad::encode_keys(&cfg.keys)?,
            jitter: U16::new(JITTER.encode(cfg.jitter_ms)?),
            continuous_report: cfg.continuous_report.into(),
            kalman_filter: cfg.kalman_filter.into(),
            high_speed: cfg.high_speed.into(),
        };
        Ok(block.as_bytes().to_vec())
    }

    fn lighting(&self) -> Option<&dyn LightingCodec> {
        Some(self)
    }
}

impl LightingCodec for FourKeyCodec {
    fn light_block_size(&self) -> usize {
        std::mem::size_of::<LightBlock>()
    }

    fn decode_lighting(&self, bytes: &[u8]) -> Result<LightingConfig, KeyboardError> {
        let b: LightBlock = read_block(bytes, "4K light block")?;
        let effects = LightEffects {
            sleep_mode: decode_mode("sleep_mode", b.sleep_mode)?,
            rainbow_flow_speed: b.rainbow_flow_speed.get(),
            color_change_rate: b.color_change_rate,
            flow_delay: decode_bool("flow_delay", b.flow_delay)?,
            rainbow_speed: b.rainbow_speed.get(),
            breathing_speed: b.breathing_speed.get(),
            max_keep_time: b.max_keep_time.get(),
            min_keep_time: b.min_keep_time.get(),
            breaths_before_color_switch: b.breaths_before_color_switch,
            rain_drop_speed: b.rain_drop_speed.get(),
            random_rain_chance: b.random_rain_chance.get(),
            tap_to_glow_speed: b.tap_to_glow_speed.get(),
            max_lum_freeze_time: b.max_lum_freeze_time,
            change_color_when_pressed: decode_bool(
                "change_color_when_pressed",
                b.change_color_when_pressed,
            )?,
            random_color_mode: decode_bool("random_color_mode", b.random_color_mode)?,
            speed_light_speed: b.speed_light_speed.get(),
            attenuation_speed: b.attenuation_speed.get(),
            increase_difficulty: b.increase_difficulty,
            low_speed_color: Rgb::from_u32(b.low_speed_color.get()),
            high_speed_color: Rgb::from_u32(b.high_speed_color.get()),
        };
        Ok(LightingConfig {
            colors: keypad::decode_colors(&b.colors),
            mode: decode_mode("mode", b.mode)?,
            max_brightness: decode_brightness(b.max_brightness)?,
            sleep_time: b.sleep_time.get(),
            effects: Some(effects),
        })
    }

    fn encode_lighting(&self, config: &LightingConfig) -> Result<Vec<u8>, KeyboardError> {
        let e = config
            .effects
            .as_ref()
            .ok_or_else(|| KeyboardError::invalid_field("effects", "required on the 4K"))?;
        let block = LightBlock {
            colors: keypad::encode_colors(&config.colors)?,
            mode: config.mode as u8,
            sleep_mode: e.sleep_mode as u8,
            max_brightness: encode_brightness(config.max_brightness)?,
            sleep_time: U16::new(config.sleep_time),
            rainbow_flow_speed: U16::new(e.rainbow_flow_speed),
            color_change_rate: e.color_change_rate,
            flow_delay: e.flow_delay.into(),
            rainbow_speed: U16::new(e.rainbow_speed),
            breathing_speed: U16::new(e.breathing_speed),
            max_keep_time: U16::new(e.max_keep_time),
            min_keep_time: U16::new(e.min_keep_time),
            breaths_before_color_switch: e.breaths_before_color_switch,
            rain_drop_speed: U16::new(e.rain_drop_speed),
            random_rain_chance: U16::new(e.random_rain_chance),
            tap_to_glow_speed: U16::new(e.tap_to_glow_speed),
            max_lum_freeze_time: e.max_lum_freeze_time,
            change_color_when_pressed: e.change_color_when_pressed.into(),
            random_color_mode: e.random_color_mode.into(),
            speed_light_speed: U16::new(e.speed_light_speed),
            attenuation_speed: U16::new(e.attenuation_speed),
            increase_difficulty: e.increase_difficulty,
            low_speed_color: U32::new(e.low_speed_color.to_u32()),
            high_speed_color: U32::new(e.high_speed_color.to_u32()),
        };
        Ok(block.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyConfig;
    use crate::keycode::KeyCode;

    #[test]
    fn test_sizes() {
        assert_eq!(std::mem::size_of::<KeyBlock>(), 41);
        assert_eq!(std::mem::size_of::<LightBlock>(), 56);
    }

    #[test]
    fn test_key_roundtrip_and_scaling() {
        let config = Configuration::FourKey(FourKeyConfig {
            keys: vec![
                KeyConfig::new(50, 50, 10, vec![KeyCode::Z]),
                KeyConfig::new(1, 2, 3, vec![KeyCode::X]),
                KeyConfig::new(100, 100, 100, vec![KeyCode::C, KeyCode::LCtrl]),
                KeyConfig::new(0, 0, 0, vec![]),
            ],
            jitter_ms: 5,
            continuous_report: false,
            kalman_filter: true,
            high_speed: true,
        });
        let bytes = FourKeyCodec.encode(&config).unwrap();
        assert_eq!(bytes[0], 100);
        assert_eq!(&bytes[36..38], &40u16.to_le_bytes());
        assert_eq!(&bytes[38..], &[0, 1, 1]);
        assert_eq!(FourKeyCodec.decode(&bytes).unwrap(), config);
    }

    #[test]
    fn test_out_of_range_stored_percent() {
        let mut bytes = FourKeyCodec
            .encode(&Configuration::default_for(DeviceFamily::FourKey))
            .unwrap();
        bytes[9] = 201;
        assert!(matches!(
            FourKeyCodec.decode(&bytes),
            Err(KeyboardError::MalformedConfig(_))
        ));
    }

    #[test]
    fn test_lighting_roundtrip() {
        let mut light = LightingConfig::default_for(DeviceFamily::FourKey).unwrap();
        light.mode = LightingMode::SpeedLight;
        light.colors[2] = Rgb::new(1, 2, 3);
        if let Some(e) = light.effects.as_mut() {
            e.random_rain_chance = 1234;
            e.high_speed_color = Rgb::new(0, 255, 0);
        }
        let bytes = FourKeyCodec.encode_lighting(&light).unwrap();
        assert_eq!(bytes.len(), 56);
        assert_eq!(bytes[16], LightingMode::SpeedLight as u8);
        assert_eq!(FourKeyCodec.decode_lighting(&bytes).unwrap(), light);
    }

    #[test]
    fn test_lighting_requires_effects() {
        let mut light = LightingConfig::default_for(DeviceFamily::FourKey).unwrap();
        light.effects = None;
        assert!(matches!(
            FourKeyCodec.encode_lighting(&light),
            Err(KeyboardError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_unknown_mode_is_malformed() {
        let light = LightingConfig::default_for(DeviceFamily::FourKey).unwrap();
        let mut bytes = FourKeyCodec.encode_lighting(&light).unwrap();
        bytes[16] = 12;
        assert!(matches!(
            FourKeyCodec.decode_lighting(&bytes),
            Err(KeyboardError::MalformedConfig(_))
        ));
    }
}
