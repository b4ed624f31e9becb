//! Meowpad configuration tool CLI
//!
//! A command-line interface for Meowpad keypads and Meowboard keyboards.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use meowpad_driver::AppConfig;
use meowpad_keyboard::SessionManager;
use meowpad_transport::protocol::timing;
use meowpad_transport::HidDiscovery;

// CLI definitions
mod cli;
use cli::{Cli, Commands, ConfigCommands, LightCommands, PresetCommands};

// Command handlers
mod commands;
use commands::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let settings = AppConfig::load(&config_path)?;

    // RUST_LOG wins, then -v, then the settings file
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match cli.verbose {
            0 => tracing_subscriber::EnvFilter::new(&settings.log_filter),
            1 => tracing_subscriber::EnvFilter::new("meowpad=debug"),
            _ => tracing_subscriber::EnvFilter::new("meowpad=trace"),
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    debug!("Settings from {:?}", config_path);

    let manager = SessionManager::new(HidDiscovery::probing(timing::PROBE_TIMEOUT_MS))
        .with_read_timeout(settings.read_timeout_ms);
    let ctx = Context {
        manager,
        settings,
        device: cli.device,
    };

    match cli.command {
        // Default: show device info
        None | Some(Commands::Info) => commands::device::info(&ctx).await?,
        Some(Commands::List) => commands::device::list(&ctx).await?,
        Some(Commands::Status) => commands::device::status(&ctx).await?,
        Some(Commands::Debug { watch }) => commands::device::debug(&ctx, watch).await?,

        // === Configuration ===
        Some(Commands::Config(cmd)) => match cmd {
            ConfigCommands::Get { json } => commands::config::get(&ctx, json).await?,
            ConfigCommands::Set(args) => commands::config::set(&ctx, &args).await?,
            ConfigCommands::Export { file } => commands::config::export(&ctx, &file).await?,
            ConfigCommands::Import { file } => commands::config::import(&ctx, &file).await?,
            ConfigCommands::Check { file, family } => {
                commands::config::check(&ctx, &file, family).await?
            }
        },
        Some(Commands::Light(cmd)) => match cmd {
            LightCommands::Get { json } => commands::config::light_get(&ctx, json).await?,
            LightCommands::Set {
                mode,
                brightness,
                color,
            } => {
                commands::config::light_set(&ctx, mode.as_deref(), brightness, color.as_deref())
                    .await?
            }
        },
        Some(Commands::Calibrate { keys, timeout }) => {
            commands::calibrate::calibrate(&ctx, &keys, timeout).await?
        }
        Some(Commands::Reset { reboot }) => commands::device::reset(&ctx, reboot).await?,

        // === Firmware ===
        Some(Commands::Erase { yes }) => commands::device::erase(&ctx, yes).await?,
        Some(Commands::Flash { file }) => commands::firmware::flash(&ctx, &file).await?,
        Some(Commands::CheckUpdate { download }) => {
            commands::firmware::check_update(&ctx, download.as_deref()).await?
        }

        // === Presets ===
        Some(Commands::Preset(cmd)) => match cmd {
            PresetCommands::Save { name } => commands::preset::save(&ctx, &name).await?,
            PresetCommands::Apply { preset } => commands::preset::apply(&ctx, &preset).await?,
            PresetCommands::List => commands::preset::list(&ctx)?,
        },
    }

    ctx.manager.disconnect().await;
    Ok(())
}
