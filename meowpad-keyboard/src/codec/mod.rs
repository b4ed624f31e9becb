//! Binary config codec
//!
//! One [`ConfigCodec`] per device family maps the typed [`Configuration`]
//! to the fixed-layout key block the firmware stores, and families with
//! LEDs add a [`LightingCodec`] for the light block. All unit scaling
//! between UI values and device values happens in this module:
//!
//! | Field          | ThreeKey / FourKey | Board     |
//! |----------------|--------------------|-----------|
//! | percentages    | wire = ui * 2      | wire = ui |
//! | jitter (ms)    | wire = ui * 8      | wire = ui |
//! | max brightness | wire = ui / 2      | -         |
//!
//! A raw config is the key block followed by the light block (if any).

mod board;
mod four_key;
mod keypad;
mod three_key;
mod units;

pub use board::BoardCodec;
pub use four_key::FourKeyCodec;
pub use three_key::ThreeKeyCodec;

use meowpad_transport::DeviceFamily;

use crate::config::{Configuration, LightingConfig};
use crate::error::KeyboardError;

/// Key block codec of one family
pub trait ConfigCodec: Send + Sync {
    fn family(&self) -> DeviceFamily;

    /// Exact size of the key block
    fn key_block_size(&self) -> usize;

    /// Decode a key block; `MalformedConfig` on bad length or out-of-range values
    fn decode(&self, bytes: &[u8]) -> Result<Configuration, KeyboardError>;

    /// Encode a configuration; `InvalidField` when a value cannot be represented
    fn encode(&self, config: &Configuration) -> Result<Vec<u8>, KeyboardError>;

    /// Light block codec, for families with LEDs
    fn lighting(&self) -> Option<&dyn LightingCodec> {
        None
    }
}

/// Light block codec of one family
pub trait LightingCodec: Send + Sync {
    fn light_block_size(&self) -> usize;

    fn decode_lighting(&self, bytes: &[u8]) -> Result<LightingConfig, KeyboardError>;

    fn encode_lighting(&self, config: &LightingConfig) -> Result<Vec<u8>, KeyboardError>;
}

/// Codec for a classified family
pub fn codec_for(family: DeviceFamily) -> Box<dyn ConfigCodec> {
    match family {
        DeviceFamily::ThreeKey => Box::new(ThreeKeyCodec),
        DeviceFamily::FourKey => Box::new(FourKeyCodec),
        DeviceFamily::Board(keys) => Box::new(BoardCodec::new(keys)),
    }
}

pub fn decode(family: DeviceFamily, bytes: &[u8]) -> Result<Configuration, KeyboardError> {
    codec_for(family).decode(bytes)
}

pub fn encode(family: DeviceFamily, config: &Configuration) -> Result<Vec<u8>, KeyboardError> {
    codec_for(family).encode(config)
}

pub fn decode_lighting(family: DeviceFamily, bytes: &[u8]) -> Result<LightingConfig, KeyboardError> {
    let codec = codec_for(family);
    let light = codec.lighting().ok_or_else(|| no_lighting(family))?;
    light.decode_lighting(bytes)
}

pub fn encode_lighting(
    family: DeviceFamily,
    config: &LightingConfig,
) -> Result<Vec<u8>, KeyboardError> {
    let codec = codec_for(family);
    let light = codec.lighting().ok_or_else(|| no_lighting(family))?;
    light.encode_lighting(config)
}

fn no_lighting(family: DeviceFamily) -> KeyboardError {
    KeyboardError::NotSupported(format!("{family} has no lighting"))
}

/// Size of the key block of a family
pub fn key_block_size(family: DeviceFamily) -> usize {
    codec_for(family).key_block_size()
}

/// Size of a full raw config (key block plus light block)
pub fn expected_size(family: DeviceFamily) -> usize {
    let codec = codec_for(family);
    codec.key_block_size() + codec.lighting().map_or(0, |l| l.light_block_size())
}

/// Split a raw config into its key and light blocks
pub fn split_raw(family: DeviceFamily, bytes: &[u8]) -> Result<(&[u8], Option<&[u8]>), KeyboardError> {
    let expected = expected_size(family);
    if bytes.len() != expected {
        return Err(KeyboardError::malformed(format!(
            "{family} raw config is {expected} bytes, got {}",
            bytes.len()
        )));
    }
    let key_len = key_block_size(family);
    let (keys, light) = bytes.split_at(key_len);
    Ok((keys, (!light.is_empty()).then_some(light)))
}

/// Decode a raw config
pub fn decode_raw(
    family: DeviceFamily,
    bytes: &[u8],
) -> Result<(Configuration, Option<LightingConfig>), KeyboardError> {
    let (keys, light) = split_raw(family, bytes)?;
    let config = decode(family, keys)?;
    let lighting = light.map(|l| decode_lighting(family, l)).transpose()?;
    Ok((config, lighting))
}

/// Encode a raw config; lighting must be given exactly when the family has LEDs
pub fn encode_raw(
    family: DeviceFamily,
    config: &Configuration,
    lighting: Option<&LightingConfig>,
) -> Result<Vec<u8>, KeyboardError> {
    let mut out = encode(family, config)?;
    match (family.has_lighting(), lighting) {
        (true, Some(light)) => out.extend(encode_lighting(family, light)?),
        (false, None) => {}
        (true, None) => {
            return Err(KeyboardError::invalid_field(
                "lighting",
                format!("{family} raw config needs a light block"),
            ))
        }
        (false, Some(_)) => {
            return Err(KeyboardError::invalid_field(
                "lighting",
                format!("{family} has no lighting"),
            ))
        }
    }
    Ok(out)
}
