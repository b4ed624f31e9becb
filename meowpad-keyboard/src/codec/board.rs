use meowpad_transport::DeviceFamily;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::units::{check_len, decode_bool, read_block, JitterScale, PercentScale};
use super::ConfigCodec;
use crate::config::{BoardConfig, BoardKeyConfig, Configuration};
use crate::error::KeyboardError;
use crate::keycode::MixedKey;

const PERCENT: PercentScale = PercentScale::Direct;
const JITTER: JitterScale = JitterScale(1);

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct BoardKeyRaw {
    press: u8,
    release: u8,
    dead_zone: u8,
    release_dead_zone: u8,
}

#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct Flags {
    jitter: U16,
    continuous_report: u8,
    kalman_filter: u8,
    high_speed: u8,
}

const KEY_SIZE: usize = std::mem::size_of::<BoardKeyRaw>();
const FLAGS_SIZE: usize = std::mem::size_of::<Flags>();
const LAYER_ENTRY_SIZE: usize = 2;

/// Meowboard keyboard with `keys` analog keys
///
/// Block layout: `keys` key records, the flags, then the normal and Fn
/// layers as `[kind, code]` pairs.
#[derive(Debug, Clone, Copy)]
pub struct BoardCodec {
    keys: usize,
}

impl BoardCodec {
    pub fn new(keys: usize) -> Self {
        Self { keys }
    }

    fn layer_size(&self) -> usize {
        self.keys * LAYER_ENTRY_SIZE
    }

    fn decode_layer(&self, name: &str, bytes: &[u8]) -> Result<Vec<MixedKey>, KeyboardError> {
        bytes
            .chunks_exact(LAYER_ENTRY_SIZE)
            .enumerate()
            .map(|(i, pair)| {
                MixedKey::from_wire([pair[0], pair[1]]).ok_or_else(|| {
                    KeyboardError::malformed(format!(
                        "{name}[{i}]: invalid key {:02X} {:02X}",
                        pair[0], pair[1]
                    ))
                })
            })
            .collect()
    }
}

impl ConfigCodec for BoardCodec {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::Board(self.keys)
    }

    fn key_block_size(&self) -> usize {
        self.keys * KEY_SIZE + FLAGS_SIZE + 2 * self.layer_size()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Configuration, KeyboardError> {
        if bytes.len() != self.key_block_size() {
            return Err(KeyboardError::malformed(format!(
                "board key block is {} bytes, got {}",
                self.key_block_size(),
                bytes.len()
            )));
        }
        let (key_bytes, rest) = bytes.split_at(self.keys * KEY_SIZE);
        let (flag_bytes, layers) = rest.split_at(FLAGS_SIZE);
        let (normal, fn_layer) = layers.split_at(self.layer_size());

        let raw_keys = <[BoardKeyRaw]>::ref_from_bytes(key_bytes)
            .map_err(|_| KeyboardError::malformed("board key records misaligned"))?;
        let keys = raw_keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let field = |name: &str| format!("keys[{i}].{name}");
                Ok(BoardKeyConfig {
                    press: PERCENT.decode(&field("press"), k.press)?,
                    release: PERCENT.decode(&field("release"), k.release)?,
                    dead_zone: PERCENT.decode(&field("dead_zone"), k.dead_zone)?,
                    release_dead_zone: PERCENT
                        .decode(&field("release_dead_zone"), k.release_dead_zone)?,
                })
            })
            .collect::<Result<Vec<_>, KeyboardError>>()?;

        let flags: Flags = read_block(flag_bytes, "board flags")?;
        Ok(Configuration::Board(BoardConfig {
            keys,
            jitter_ms: JITTER.decode(flags.jitter.get()),
            continuous_report: decode_bool("continuous_report", flags.continuous_report)?,
            kalman_filter: decode_bool("kalman_filter", flags.kalman_filter)?,
            high_speed: decode_bool("high_speed", flags.high_speed)?,
            normal_layer: self.decode_layer("normal_layer", normal)?,
            fn_layer: self.decode_layer("fn_layer", fn_layer)?,
        }))
    }

    fn encode(&self, config: &Configuration) -> Result<Vec<u8>, KeyboardError> {
        let Configuration::Board(cfg) = config else {
            return Err(KeyboardError::invalid_field(
                "family",
                format!("{} config given to the board codec", config.family()),
            ));
        };
        check_len("keys", cfg.keys.len(), self.keys)?;
        check_len("normal_layer", cfg.normal_layer.len(), self.keys)?;
        check_len("fn_layer", cfg.fn_layer.len(), self.keys)?;

        let mut out = Vec::with_capacity(self.key_block_size());
        for (i, key) in cfg.keys.iter().enumerate() {
            let field = |name: &str| format!("keys[{i}].{name}");
            let raw = BoardKeyRaw {
                press: PERCENT.encode(&field("press"), key.press)?,
                release: PERCENT.encode(&field("release"), key.release)?,
                dead_zone: PERCENT.encode(&field("dead_zone"), key.dead_zone)?,
                release_dead_zone: PERCENT
                    .encode(&field("release_dead_zone"), key.release_dead_zone)?,
            };
            out.extend_from_slice(raw.as_bytes());
        }
        let flags = Flags {
            jitter: U16::new(JITTER.encode(cfg.jitter_ms)?),
            continuous_report: cfg.continuous_report.into(),
            kalman_filter: cfg.kalman_filter.into(),
            high_speed: cfg.high_speed.into(),
        };
        out.extend_from_slice(flags.as_bytes());
        for key in cfg.normal_layer.iter().chain(&cfg.fn_layer) {
            out.extend_from_slice(&key.to_wire());
        }
        Ok(out)
    }
}
