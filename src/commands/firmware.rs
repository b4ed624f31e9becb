//! Firmware command handlers.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context as _};
use meowpad_driver::firmware_api;
use meowpad_keyboard::iap::MAX_FIRMWARE_SIZE;
use meowpad_keyboard::{IapProgress, IapState};

use super::{CommandResult, Context};

/// Program an image through the bootloader
pub async fn flash(ctx: &Context, file: &Path) -> CommandResult {
    let image = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    if image.is_empty() || image.len() > MAX_FIRMWARE_SIZE {
        bail!(
            "{}: {} bytes, expected 1..={MAX_FIRMWARE_SIZE}",
            file.display(),
            image.len()
        );
    }

    let mut iap = ctx.connect_bootloader().await?;
    println!("Flashing {} ({} bytes) to {}", file.display(), image.len(), iap.descriptor());

    let mut last = (IapState::Idle, 0);
    iap.flash(&image, |p: IapProgress| {
        let percent = if p.total == 0 { 100 } else { p.address * 100 / p.total };
        if (p.state, percent) != last {
            let label = match p.state {
                IapState::Programming => "Programming",
                IapState::Verifying => "Verifying",
                IapState::Idle => "Done",
            };
            print!("\r{label:<12} {percent:>3}%");
            let _ = std::io::stdout().flush();
            last = (p.state, percent);
        }
    })
    .await?;
    println!("\nFirmware flashed; the device restarts with the new image.");
    Ok(())
}

/// Compare the connected device and this tool against the release manifest
#[cfg(feature = "firmware-api")]
pub async fn check_update(ctx: &Context, download: Option<&Path>) -> CommandResult {
    let info = firmware_api::fetch_version_info(&ctx.settings.version_url).await?;

    let own = env!("CARGO_PKG_VERSION");
    if info.has_newer_configurator(own) {
        println!("Configurator {} available (running {own})", info.configurator_version);
        println!("  {}", info.download_url);
    } else {
        println!("Configurator is up to date ({own})");
    }

    let pad = ctx.connect().await?;
    let current = pad.get_firmware_version().await?;
    match info.firmware_update_for(pad.family(), &current) {
        Some(release) => {
            println!(
                "Firmware {} available for {} (running {current})",
                release.version,
                pad.descriptor().name
            );
            println!("  {}", release.download_url);
            if let Some(sha) = &release.sha256 {
                println!("  sha256 {sha}");
            }
            if let Some(path) = download {
                let size = firmware_api::download_firmware(&release.download_url, path).await?;
                println!("Saved {size} bytes to {}", path.display());
            }
        }
        None => println!("Firmware is up to date ({current})"),
    }
    Ok(())
}

#[cfg(not(feature = "firmware-api"))]
pub async fn check_update(_ctx: &Context, _download: Option<&Path>) -> CommandResult {
    bail!("Built without the firmware-api feature")
}
