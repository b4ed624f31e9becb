//! Preset handlers.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use meowpad_keyboard::preset::{self, PRESET_EXTENSION};
use meowpad_keyboard::DevicePreset;

use super::config::report_outcome;
use super::{CommandResult, Context};

/// Save the current key setup
pub async fn save(ctx: &Context, name: &str) -> CommandResult {
    let pad = ctx.connect().await?;
    let config = pad.get_config().await?;
    let info = pad.get_device_info().await?;
    let preset = DevicePreset::from_config(
        name,
        &info.name,
        pad.descriptor().serial.clone(),
        &config,
    );
    let path = preset.save_in(&ctx.settings.preset_dir())?;
    println!("Saved preset '{name}' to {}", path.display());
    Ok(())
}

/// Resolve a preset argument: an existing path, else a name in the preset dir
fn find(ctx: &Context, arg: &str) -> anyhow::Result<(PathBuf, DevicePreset)> {
    let path = Path::new(arg);
    if path.is_file() {
        let preset = DevicePreset::load(path)?;
        return Ok((path.to_path_buf(), preset));
    }
    let dir = ctx.settings.preset_dir();
    preset::load_dir(&dir)?
        .into_iter()
        .find(|(_, p)| p.name == arg)
        .ok_or_else(|| anyhow!("No preset named '{arg}' in {}", dir.display()))
}

/// Apply a preset and save it
pub async fn apply(ctx: &Context, arg: &str) -> CommandResult {
    let (path, preset) = find(ctx, arg)?;
    let pad = ctx.connect().await?;
    let current = pad.get_config().await?;
    let updated = preset
        .apply_to(&current)
        .with_context(|| format!("applying {}", path.display()))?;
    report_outcome(pad.apply_config(&updated).await?, "Preset")
}

/// List stored presets
pub fn list(ctx: &Context) -> CommandResult {
    let dir = ctx.settings.preset_dir();
    let presets = preset::load_dir(&dir)?;
    if presets.is_empty() {
        println!("No presets in {} (*.{PRESET_EXTENSION})", dir.display());
        return Ok(());
    }
    for (path, p) in presets {
        let family = p
            .device
            .family
            .map(|f| f.to_string())
            .unwrap_or_else(|| "?".into());
        println!(
            "{:<24} {:<6} {:<20} {}",
            p.name,
            family,
            p.device.device_name,
            path.display()
        );
    }
    Ok(())
}
