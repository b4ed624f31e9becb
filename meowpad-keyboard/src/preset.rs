//! Shareable key presets (`.pcf` files)
//!
//! A preset carries key thresholds and binding layers, never lighting and
//! never raw bytes. Applying one rebuilds the target's typed configuration
//! and re-encodes it for the target family, so a preset taken from one unit
//! can be loaded onto another.

use std::path::{Path, PathBuf};

use meowpad_transport::DeviceFamily;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec;
use crate::config::Configuration;
use crate::error::KeyboardError;
use crate::keycode::MixedKey;

/// File extension of preset files
pub const PRESET_EXTENSION: &str = "pcf";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePreset {
    pub id: String,
    pub name: String,
    pub device: DevicePresetInfo,
    pub config: DevicePresetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePresetInfo {
    pub device_name: String,
    pub serial_number: Option<String>,
    /// Family the preset was taken from
    #[serde(default)]
    pub family: Option<DeviceFamily>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DevicePresetConfig {
    /// Normal layer, then Fn layer
    pub key_layers: Option<Vec<KeyLayer>>,
    pub key_configs: Option<Vec<PresetKeyConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLayer {
    pub keys: Vec<MixedKey>,
}

/// Thresholds of one key, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetKeyConfig {
    pub press_percentage: u8,
    pub release_percentage: u8,
    pub dead_zone: u8,
    #[serde(default)]
    pub release_dead_zone: u8,
    /// Rapid trigger switch; kept as found, the config model has no counterpart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rt_enabled: Option<bool>,
}

impl DevicePreset {
    /// Capture the key settings of `config`
    pub fn from_config(
        name: &str,
        device_name: &str,
        serial_number: Option<String>,
        config: &Configuration,
    ) -> Self {
        let (key_layers, key_configs) = match config {
            Configuration::Board(b) => (
                Some(vec![
                    KeyLayer {
                        keys: b.normal_layer.clone(),
                    },
                    KeyLayer {
                        keys: b.fn_layer.clone(),
                    },
                ]),
                b.keys
                    .iter()
                    .map(|k| PresetKeyConfig {
                        press_percentage: k.press,
                        release_percentage: k.release,
                        dead_zone: k.dead_zone,
                        release_dead_zone: k.release_dead_zone,
                        rt_enabled: None,
                    })
                    .collect(),
            ),
            Configuration::ThreeKey(c) => (None, keypad_keys(&c.keys)),
            Configuration::FourKey(c) => (None, keypad_keys(&c.keys)),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            device: DevicePresetInfo {
                device_name: device_name.to_string(),
                serial_number,
                family: Some(config.family()),
            },
            config: DevicePresetConfig {
                key_layers,
                key_configs: Some(key_configs),
            },
        }
    }

    /// Apply onto `target`, returning the updated configuration
    ///
    /// Sections whose length does not match the target are skipped with a
    /// warning. The result is encoded once for the target family so an
    /// unrepresentable value fails here, before any device I/O.
    pub fn apply_to(&self, target: &Configuration) -> Result<Configuration, KeyboardError> {
        let mut config = target.clone();
        let count = config.key_count();

        match &self.config.key_configs {
            Some(keys) if keys.len() == count => apply_thresholds(&mut config, keys),
            Some(keys) => warn!(
                "Preset '{}' has {} key configs, target has {}; skipped",
                self.name,
                keys.len(),
                count
            ),
            None => {}
        }

        if let Some(layers) = &self.config.key_layers {
            match config.as_board_mut() {
                Some(board) => {
                    for (i, layer) in layers.iter().enumerate() {
                        let slot = match i {
                            0 => &mut board.normal_layer,
                            1 => &mut board.fn_layer,
                            _ => {
                                debug!("Ignoring extra preset layer {}", i);
                                continue;
                            }
                        };
                        if layer.keys.len() == slot.len() {
                            slot.clone_from(&layer.keys);
                        } else {
                            warn!(
                                "Preset '{}' layer {} has {} keys, target has {}; skipped",
                                self.name,
                                i,
                                layer.keys.len(),
                                slot.len()
                            );
                        }
                    }
                }
                None => warn!(
                    "Preset '{}' carries key layers; {} has none",
                    self.name,
                    config.family()
                ),
            }
        }

        codec::encode(target.family(), &config)?;
        Ok(config)
    }

    /// Suggested file name: the preset name with path separators replaced
    pub fn file_name(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
            .collect();
        format!("{stem}.{PRESET_EXTENSION}")
    }

    pub fn save(&self, path: &Path) -> Result<(), KeyboardError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Save into `dir` under [`file_name`](Self::file_name)
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, KeyboardError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        self.save(&path)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, KeyboardError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn keypad_keys(keys: &[crate::config::KeyConfig]) -> Vec<PresetKeyConfig> {
    keys.iter()
        .map(|k| PresetKeyConfig {
            press_percentage: k.press,
            release_percentage: k.release,
            dead_zone: k.dead_zone,
            release_dead_zone: 0,
            rt_enabled: None,
        })
        .collect()
}

fn apply_thresholds(config: &mut Configuration, keys: &[PresetKeyConfig]) {
    match config {
        Configuration::Board(b) => {
            for (key, p) in b.keys.iter_mut().zip(keys) {
                key.press = p.press_percentage;
                key.release = p.release_percentage;
                key.dead_zone = p.dead_zone;
                key.release_dead_zone = p.release_dead_zone;
            }
        }
        Configuration::ThreeKey(c) => apply_keypad(&mut c.keys, keys),
        Configuration::FourKey(c) => apply_keypad(&mut c.keys, keys),
    }
}

fn apply_keypad(target: &mut [crate::config::KeyConfig], keys: &[PresetKeyConfig]) {
    for (key, p) in target.iter_mut().zip(keys) {
        key.press = p.press_percentage;
        key.release = p.release_percentage;
        key.dead_zone = p.dead_zone;
    }
}

/// Every readable preset in `dir`, sorted by name
///
/// A missing directory yields an empty list; unreadable files are skipped.
pub fn load_dir(dir: &Path) -> Result<Vec<(PathBuf, DevicePreset)>, KeyboardError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut presets = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(PRESET_EXTENSION) {
            continue;
        }
        match DevicePreset::load(&path) {
            Ok(preset) => presets.push((path, preset)),
            Err(e) => warn!("Skipping preset {}: {}", path.display(), e),
        }
    }
    presets.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    Ok(presets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycode::KeyCode;

    fn board() -> Configuration {
        Configuration::default_for(DeviceFamily::Board(64))
    }

    #[test]
    fn test_board_preset_roundtrip() {
        let mut source = board();
        if let Some(b) = source.as_board_mut() {
            b.keys[10].press = 33;
            b.fn_layer[20] = MixedKey::Media(0x0A);
        }
        let preset = DevicePreset::from_config("gaming", "PURE64", None, &source);
        assert_eq!(preset.device.family, Some(DeviceFamily::Board(64)));
        assert!(Uuid::parse_str(&preset.id).is_ok());

        let applied = preset.apply_to(&board()).unwrap();
        assert_eq!(applied, source);
    }

    #[test]
    fn test_length_mismatch_skipped() {
        let mut preset = DevicePreset::from_config("p", "PURE64", None, &board());
        if let Some(keys) = preset.config.key_configs.as_mut() {
            keys.truncate(10);
            keys[0].press_percentage = 77;
        }
        let target = board();
        let applied = preset.apply_to(&target).unwrap();
        assert_eq!(
            applied.as_board().unwrap().keys,
            target.as_board().unwrap().keys
        );
    }

    #[test]
    fn test_keypad_gets_thresholds_only() {
        let source = board();
        let mut preset = DevicePreset::from_config("p", "PURE64", None, &source);
        preset.config.key_configs = Some(vec![
            PresetKeyConfig {
                press_percentage: 20,
                release_percentage: 30,
                dead_zone: 5,
                release_dead_zone: 5,
                rt_enabled: None,
            };
            4
        ]);
        let target = Configuration::default_for(DeviceFamily::FourKey);
        let applied = preset.apply_to(&target).unwrap();
        let Configuration::FourKey(c) = applied else {
            panic!("family changed");
        };
        assert_eq!(c.keys[3].press, 20);
        assert_eq!(c.keys[3].actions, vec![KeyCode::V]);
    }

    #[test]
    fn test_unencodable_preset_rejected() {
        let mut preset = DevicePreset::from_config("p", "PURE64", None, &board());
        if let Some(keys) = preset.config.key_configs.as_mut() {
            keys[0].press_percentage = 150;
        }
        assert!(matches!(
            preset.apply_to(&board()),
            Err(KeyboardError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_save_and_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        let b = DevicePreset::from_config("b/second", "PURE64", None, &board());
        let a = DevicePreset::from_config("a first", "PURE64", Some("SN1".into()), &board());
        let path = b.save_in(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "b_second.pcf");
        a.save_in(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.pcf"), "{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let loaded = load_dir(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].1, a);
        assert_eq!(loaded[1].1, b);

        assert!(load_dir(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_reads_files_without_family() {
        let json = r#"{
            "id": "x", "name": "old",
            "device": { "device_name": "Pure64", "serial_number": null },
            "config": { "key_layers": null, "key_configs": null }
        }"#;
        let preset: DevicePreset = serde_json::from_str(json).unwrap();
        assert_eq!(preset.device.family, None);
    }

    #[test]
    fn test_rapid_trigger_flag_kept() {
        let json = r#"{
            "id": "x", "name": "rt",
            "device": { "device_name": "Pure64", "serial_number": null },
            "config": {
                "key_layers": null,
                "key_configs": [
                    { "press_percentage": 40, "release_percentage": 40, "dead_zone": 5,
                      "release_dead_zone": 5, "rt_enabled": false },
                    { "press_percentage": 40, "release_percentage": 40, "dead_zone": 5 }
                ]
            }
        }"#;
        let preset: DevicePreset = serde_json::from_str(json).unwrap();
        let keys = preset.config.key_configs.as_ref().unwrap();
        assert_eq!(keys[0].rt_enabled, Some(false));
        assert_eq!(keys[1].rt_enabled, None);

        let dir = tempfile::tempdir().unwrap();
        let path = preset.save_in(dir.path()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("rt_enabled").count(), 1);
        assert_eq!(DevicePreset::load(&path).unwrap(), preset);
    }
}
