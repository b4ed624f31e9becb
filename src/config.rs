//! Application settings
//!
//! Stored as TOML under the platform config dir
//! (`~/.config/meowpad/config.toml` on Linux). Every field has a default, so
//! a missing file or a partial one both load.

use std::path::{Path, PathBuf};

use meowpad_transport::protocol::timing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Directory name under the platform config dir
const APP_DIR: &str = "meowpad";

/// Default version manifest endpoint
pub const DEFAULT_VERSION_URL: &str = "https://desu.life/device/configurator_version/v2/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bound on a single report read (ms)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u32,
    /// Version manifest queried by `check-update`
    #[serde(default = "default_version_url")]
    pub version_url: String,
    /// Where presets are stored; defaults to `<config dir>/presets`
    #[serde(default)]
    pub preset_dir: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_read_timeout() -> u32 {
    timing::READ_TIMEOUT_MS
}

fn default_version_url() -> String {
    DEFAULT_VERSION_URL.to_string()
}

fn default_log_filter() -> String {
    "meowpad=info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout(),
            version_url: default_version_url(),
            preset_dir: None,
            log_filter: default_log_filter(),
        }
    }
}

fn config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        config_root().join("config.toml")
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io)
    }

    pub fn preset_dir(&self) -> PathBuf {
        self.preset_dir
            .clone()
            .unwrap_or_else(|| config_root().join("presets"))
    }
}
