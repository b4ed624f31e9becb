use meowpad_transport::DeviceFamily;
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::keypad::{self, KeypadKeyRaw, JITTER};
use super::units::{
    decode_actions, decode_bool, decode_brightness, encode_actions, encode_brightness, read_block,
};
use super::{ConfigCodec, LightingCodec};
use crate::config::{Configuration, LightingConfig, LightingMode, ThreeKeyConfig, ACTION_SLOTS};
use crate::error::KeyboardError;

const KEYS: usize = 3;

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct KeyBlock {
    keys: [KeypadKeyRaw; KEYS],
    side_button: [u8; ACTION_SLOTS],
    jitter: U16,
    continuous_report: u8,
    kalman_filter: u8,
}

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct LightBlock {
    colors: [U32; KEYS],
    mode: u8,
    max_brightness: u8,
    sleep_time: U16,
}

/// Meowpad three-key pad with side button
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeKeyCodec;

impl ConfigCodec for ThreeKeyCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::ThreeKey
    }

    fn key_block_size(&self) -> usize {
        std::mem::size_of::<KeyBlock>()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Configuration, KeyboardError> {
        let block: KeyBlock = read_block(bytes, "3K key block")?;
        Ok(Configuration::ThreeKey(ThreeKeyConfig {
            keys: keypad::decode_keys(&block.keys)?,
            side_button: decode_actions("side_button", &block.side_button)?,
            jitter_ms: JITTER.decode(block.jitter.get()),
            continuous_report: decode_bool("continuous_report", block.continuous_report)?,
            kalman_filter: decode_bool("kalman_filter", block.kalman_filter)?,
        }))
    }

    fn encode(&self, config: &Configuration) -> Result<Vec<u8>, KeyboardError> {
        let Configuration::ThreeKey(cfg) = config else {
            return Err(KeyboardError::invalid_field(
                "family",
                format!("{} config given to the 3K codec", config.family()),
            ));
        };
        let block = KeyBlock {
            keys: keypad::encode_keys(&cfg.keys)?,
            side_button: encode_actions("side_button", &cfg.side_button)?,
            jitter: U16::new(JITTER.encode(cfg.jitter_ms)?),
            continuous_report: cfg.continuous_report.into(),
            kalman_filter: cfg.kalman_filter.into(),
        };
        Ok(block.as_bytes().to_vec())
    }

    fn lighting(&self) -> Option<&dyn LightingCodec> {
        Some(self)
    }
}

impl LightingCodec for ThreeKeyCodec {
    fn light_block_size(&self) -> usize {
        std::mem::size_of::<LightBlock>()
    }

    fn decode_lighting(&self, bytes: &[u8]) -> Result<LightingConfig, KeyboardError> {
        let block: LightBlock = read_block(bytes, "3K light block")?;
        let mode = LightingMode::try_from(block.mode)
            .ok()
            .filter(|m| *m <= LightingMode::Solid)
            .ok_or_else(|| {
                KeyboardError::malformed(format!("mode: {} is not a 3K effect", block.mode))
            })?;
        Ok(LightingConfig {
            colors: keypad::decode_colors(&block.colors),
            mode,
            max_brightness: decode_brightness(block.max_brightness)?,
            sleep_time: block.sleep_time.get(),
            effects: None,
        })
    }

    fn encode_lighting(&self, config: &LightingConfig) -> Result<Vec<u8>, KeyboardError> {
        if config.mode > LightingMode::Solid {
            return Err(KeyboardError::invalid_field(
                "mode",
                format!("{} is not available on the 3K", config.mode),
            ));
        }
        if config.effects.is_some() {
            return Err(KeyboardError::invalid_field(
                "effects",
                "the 3K has no effect parameters",
            ));
        }
        let block = LightBlock {
            colors: keypad::encode_colors(&config.colors)?,
            mode: config.mode as u8,
            max_brightness: encode_brightness(config.max_brightness)?,
            sleep_time: U16::new(config.sleep_time),
        };
        Ok(block.as_bytes().to_vec())
    }
}
