//! Command handlers for the CLI application.
//!
//! - `device`: identity, status, live readings, reset and erase
//! - `config`: typed and raw key configuration, lighting
//! - `calibrate`: sensor range learning
//! - `firmware`: flashing and the release check
//! - `preset`: saved key setups

pub mod calibrate;
pub mod config;
pub mod device;
pub mod firmware;
pub mod preset;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use meowpad_driver::AppConfig;
use meowpad_keyboard::{IapProgrammer, Meowpad, SessionManager};
use meowpad_transport::DeviceDescriptor;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// What every handler needs: the session manager and the loaded settings
pub struct Context {
    pub manager: SessionManager,
    pub settings: AppConfig,
    /// Index into the device list chosen with `--device`
    pub device: Option<usize>,
}

impl Context {
    /// Normal-mode devices in listing order
    async fn normal_devices(&self) -> anyhow::Result<Vec<DeviceDescriptor>> {
        Ok(self
            .manager
            .list_devices()
            .await?
            .into_iter()
            .filter(|d| !d.is_bootloader())
            .collect())
    }

    /// Connect to the selected device
    pub async fn connect(&self) -> anyhow::Result<Arc<Meowpad>> {
        let devices = self.normal_devices().await?;
        let descriptor = choose(&devices, self.device, "supported device")?;
        Ok(self.manager.select_and_connect(descriptor).await?)
    }

    /// Open the selected device waiting in its bootloader
    pub async fn connect_bootloader(&self) -> anyhow::Result<IapProgrammer> {
        let devices: Vec<DeviceDescriptor> = self
            .manager
            .list_devices()
            .await?
            .into_iter()
            .filter(|d| d.is_bootloader())
            .collect();
        if devices.is_empty() {
            bail!("No device in bootloader mode (run `meowpad erase` first)");
        }
        let descriptor = choose(&devices, self.device, "device in bootloader mode")?;
        Ok(self.manager.connect_bootloader(descriptor).await?)
    }
}

/// Pick `index`, or the only device; several devices need an explicit `--device`
fn choose<'a>(
    devices: &'a [DeviceDescriptor],
    index: Option<usize>,
    what: &str,
) -> anyhow::Result<&'a DeviceDescriptor> {
    match (index, devices) {
        (_, []) => bail!("No {what} found"),
        (None, [only]) => Ok(only),
        (None, many) => {
            let listing: Vec<String> = many
                .iter()
                .enumerate()
                .map(|(i, d)| format!("{i:>3}  {d}"))
                .collect();
            bail!(
                "{} devices found, pick one with --device:\n{}",
                many.len(),
                listing.join("\n")
            )
        }
        (Some(i), devices) => devices
            .get(i)
            .ok_or_else(|| anyhow!("No device #{i} ({} found)", devices.len())),
    }
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}

pub fn is_running(flag: &AtomicBool) -> bool {
    flag.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meowpad_transport::{DeviceFamily, DeviceMode};

    fn device(path: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.into(),
            vid: 0x5D3E,
            pid: 0xFE07,
            interface_number: 1,
            family: DeviceFamily::FourKey,
            mode: DeviceMode::Normal,
            name: "Meowpad".into(),
            firmware_version: None,
            serial: None,
        }
    }

    #[test]
    fn test_single_device_is_default() {
        let devices = vec![device("a")];
        assert_eq!(choose(&devices, None, "device").unwrap().path, "a");
    }

    #[test]
    fn test_several_devices_need_index() {
        let devices = vec![device("a"), device("b")];
        let err = choose(&devices, None, "device").unwrap_err().to_string();
        assert!(err.contains("--device"));
        assert!(err.contains(" b"));
        assert_eq!(choose(&devices, Some(1), "device").unwrap().path, "b");
        assert!(choose(&devices, Some(2), "device").is_err());
    }

    #[test]
    fn test_no_devices() {
        assert!(choose(&[], None, "device").is_err());
        assert!(choose(&[], Some(0), "device").is_err());
    }
}
