// CLI definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use meowpad_keyboard::DeviceFamily;
use meowpad_transport::device_registry::PURE64_KEY_COUNT;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meowpad")]
#[command(author, version, about = "Meowpad/Meowboard hall-effect configuration tool")]
#[command(propagate_version = true)]
pub struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Device to use, as listed by `meowpad list` (needed when several are attached)
    #[arg(short, long, global = true)]
    pub device: Option<usize>,

    /// Settings file (default: ~/.config/meowpad/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// List supported devices
    #[command(visible_alias = "ls")]
    List,

    /// Show device name and firmware version
    #[command(visible_aliases = ["version", "v"])]
    Info,

    /// Show which configuration blocks are initialized
    #[command(visible_alias = "st")]
    Status,

    /// Live sensor readings
    Debug {
        /// Refresh until Ctrl-C (interval in ms, default: 200)
        #[arg(short, long)]
        watch: Option<Option<u64>>,
    },

    // === Configuration ===
    /// Key configuration
    #[command(subcommand, visible_alias = "cfg")]
    Config(ConfigCommands),

    /// Lighting configuration
    #[command(subcommand, visible_alias = "led")]
    Light(LightCommands),

    /// Learn sensor ranges
    #[command(visible_alias = "cal")]
    Calibrate {
        /// Key indices to calibrate (default: all keys)
        keys: Vec<usize>,
        /// Give up after this many seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Reset key, light and hall configuration to firmware defaults
    Reset {
        /// Reboot the device instead
        #[arg(long)]
        reboot: bool,
    },

    // === Firmware ===
    /// Erase the application firmware (device reboots into its bootloader)
    Erase {
        /// Confirm the erase
        #[arg(long)]
        yes: bool,
    },

    /// Program a firmware image through the bootloader
    Flash {
        /// Raw firmware image
        file: PathBuf,
    },

    /// Check for newer configurator and firmware releases
    #[command(visible_alias = "update")]
    CheckUpdate {
        /// Download the firmware image for the selected device to this path
        #[arg(long, value_name = "FILE")]
        download: Option<PathBuf>,
    },

    // === Presets ===
    /// Saved key setups
    #[command(subcommand)]
    Preset(PresetCommands),
}

/// Configuration commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the key configuration
    Get {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Change key settings and save them
    Set(ConfigSetArgs),

    /// Write the raw configuration to a file
    Export { file: PathBuf },

    /// Validate, write and save a raw configuration file
    Import { file: PathBuf },

    /// Validate a raw configuration file without writing it
    Check {
        file: PathBuf,
        /// Check offline against this family instead of the connected device
        #[arg(long, value_enum)]
        family: Option<FamilyArg>,
    },
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Key the per-key options apply to (default: every key)
    #[arg(short, long)]
    pub key: Option<usize>,

    /// Actuation point (percent of travel, 0-100)
    #[arg(long)]
    pub press: Option<u8>,

    /// Release point (percent of travel, 0-100)
    #[arg(long)]
    pub release: Option<u8>,

    /// Dead zone (percent of travel, 0-100)
    #[arg(long)]
    pub dead_zone: Option<u8>,

    /// Keypad key actions, comma separated (e.g. "LCtrl,C")
    #[arg(long, value_delimiter = ',')]
    pub actions: Option<Vec<String>>,

    /// Debounce time in ms
    #[arg(long)]
    pub jitter: Option<u16>,

    #[arg(long)]
    pub continuous_report: Option<bool>,

    #[arg(long)]
    pub kalman_filter: Option<bool>,

    /// 4K and board only
    #[arg(long)]
    pub high_speed: Option<bool>,
}

/// Lighting commands
#[derive(Subcommand)]
pub enum LightCommands {
    /// Print the lighting configuration
    Get {
        #[arg(long)]
        json: bool,
    },

    /// Change lighting and save it
    Set {
        /// Mode name (e.g. "solid", "rainbow")
        #[arg(long)]
        mode: Option<String>,
        /// Brightness (even, 0-100)
        #[arg(long)]
        brightness: Option<u8>,
        /// Color for every LED, as RRGGBB
        #[arg(long)]
        color: Option<String>,
    },
}

/// Preset commands
#[derive(Subcommand)]
pub enum PresetCommands {
    /// Save the current key setup as a preset
    Save { name: String },

    /// Apply a preset (name or path) and save it to the device
    Apply { preset: String },

    /// List stored presets
    #[command(visible_alias = "ls")]
    List,
}

/// Device family for offline checks
#[derive(Clone, Copy, ValueEnum)]
pub enum FamilyArg {
    #[value(name = "3k")]
    ThreeKey,
    #[value(name = "4k")]
    FourKey,
    Pure64,
}

impl From<FamilyArg> for DeviceFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::ThreeKey => DeviceFamily::ThreeKey,
            FamilyArg::FourKey => DeviceFamily::FourKey,
            FamilyArg::Pure64 => DeviceFamily::Board(PURE64_KEY_COUNT),
        }
    }
}
