//! Device query and maintenance handlers.

use std::time::Duration;

use anyhow::bail;
use meowpad_keyboard::{KeyState, Meowpad};

use super::{is_running, setup_interrupt_handler, CommandResult, Context};

/// List supported devices
pub async fn list(ctx: &Context) -> CommandResult {
    let devices = ctx.manager.list_devices().await?;
    if devices.is_empty() {
        println!("No supported devices found");
        return Ok(());
    }
    let mut index = 0;
    for device in &devices {
        let version = device.firmware_version.as_deref().unwrap_or("?");
        if device.is_bootloader() {
            println!("  -  {device}");
        } else {
            println!("{index:>3}  {device}  fw {version}");
            index += 1;
        }
    }
    Ok(())
}

/// Show device name and firmware version
pub async fn info(ctx: &Context) -> CommandResult {
    let pad = ctx.connect().await?;
    let info = pad.get_device_info().await?;
    let descriptor = pad.descriptor();
    println!("Device:   {}", info.name);
    println!("Model:    {} ({})", descriptor.name, descriptor.family);
    println!("Firmware: {}", info.firmware_version);
    println!("USB:      {:04X}:{:04X}", descriptor.vid, descriptor.pid);
    if let Some(serial) = &descriptor.serial {
        println!("Serial:   {serial}");
    }
    Ok(())
}

/// Show which configuration blocks are initialized
pub async fn status(ctx: &Context) -> CommandResult {
    let pad = ctx.connect().await?;
    let status = pad.get_status().await?;
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("Key config:   {}", yes_no(status.key));
    if let Some(light) = status.light {
        println!("Light config: {}", yes_no(light));
    }
    println!("Calibrated:   {}", yes_no(status.hall));
    println!("Enabled:      {}", yes_no(status.enabled));
    if !status.hall {
        println!("\nRun `meowpad calibrate` to learn the sensor ranges.");
    }
    Ok(())
}

async fn print_readings(pad: &Meowpad) -> CommandResult {
    let values = pad.get_debug_values().await?;
    println!("Key   ADC  Linear  Press  State");
    for (i, v) in values.iter().enumerate() {
        let state = match v.key_state {
            KeyState::Pressed => "pressed",
            KeyState::Released => "released",
            KeyState::Calibrating => "calibrating",
        };
        println!(
            "{:>3} {:>5} {:>7} {:>5}%  {}",
            i, v.adc_value, v.linear_value, v.press_percentage, state
        );
    }
    Ok(())
}

/// Live sensor readings, optionally refreshed until Ctrl-C
pub async fn debug(ctx: &Context, watch: Option<Option<u64>>) -> CommandResult {
    let pad = ctx.connect().await?;
    let Some(interval) = watch else {
        return print_readings(&pad).await;
    };
    let interval = Duration::from_millis(interval.unwrap_or(200));
    let running = setup_interrupt_handler();
    while is_running(&running) {
        // clear screen, cursor home
        print!("\x1b[2J\x1b[H");
        print_readings(&pad).await?;
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

/// Clear configuration, or reboot with `reboot`
pub async fn reset(ctx: &Context, reboot: bool) -> CommandResult {
    let pad = ctx.connect().await?;
    if reboot {
        pad.reset_device().await?;
        println!("Device rebooting");
    } else {
        pad.clear_config().await?;
        println!("Configuration reset to firmware defaults");
    }
    Ok(())
}

/// Wipe the application firmware
pub async fn erase(ctx: &Context, yes: bool) -> CommandResult {
    if !yes {
        bail!("Erasing removes the firmware; pass --yes to confirm");
    }
    let pad = ctx.connect().await?;
    pad.erase_firmware().await?;
    ctx.manager.disconnect().await;
    println!("Firmware erased; the device restarts in bootloader mode.");
    println!("Flash a new image with `meowpad flash <file>`.");
    Ok(())
}
