//! Device discovery for Meowpad/Meowboard devices

use std::collections::HashSet;
use std::ffi::CString;
use std::sync::Arc;

use async_trait::async_trait;
use hidapi::{HidApi, HidDevice};
use tracing::{debug, info, warn};

use crate::channel::PacketChannel;
use crate::device_registry;
use crate::error::TransportError;
use crate::hid::HidTransport;
use crate::protocol::{timing, PacketId};
use crate::types::{DeviceDescriptor, DeviceMode};
use crate::Transport;

/// Firmware version reported for bootloader descriptors
pub const BOOTLOADER_VERSION: &str = "IAP";

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// List currently available devices
    ///
    /// Returns an empty list (not an error) when nothing is attached.
    /// Unclassified devices never appear.
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open a specific device
    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

/// HID device discovery
pub struct HidDiscovery {
    /// Ask each candidate for its firmware version while listing
    probe: bool,
    probe_timeout_ms: u32,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Plain enumeration, no I/O with the devices
    pub fn new() -> Self {
        Self {
            probe: false,
            probe_timeout_ms: timing::PROBE_TIMEOUT_MS,
        }
    }

    /// Enumeration that fills `firmware_version` and drops interfaces that
    /// do not answer within `timeout_ms`
    pub fn probing(timeout_ms: u32) -> Self {
        Self {
            probe: true,
            probe_timeout_ms: timeout_ms,
        }
    }

    fn descriptor_for(device_info: &hidapi::DeviceInfo) -> Option<DeviceDescriptor> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();
        let Some(signature) = device_registry::lookup(vid, pid) else {
            return None;
        };
        Some(DeviceDescriptor {
            path: device_info.path().to_string_lossy().into_owned(),
            vid,
            pid,
            interface_number: device_info.interface_number(),
            family: signature.family,
            mode: signature.mode,
            name: signature.name.to_string(),
            firmware_version: None,
            serial: device_info
                .serial_number()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }

    /// Classified candidates, deduplicated by path, ordered by (family, path)
    fn enumerate(api: &HidApi) -> Vec<DeviceDescriptor> {
        let mut seen = HashSet::new();
        let mut devices: Vec<DeviceDescriptor> = api
            .device_list()
            .filter_map(|d| {
                let desc = Self::descriptor_for(d);
                if desc.is_none() {
                    debug!(
                        "Skipping unknown HID device {:04X}:{:04X}",
                        d.vendor_id(),
                        d.product_id()
                    );
                }
                desc
            })
            .filter(|d| seen.insert(d.path.clone()))
            .collect();
        devices.sort_by(|a, b| (a.family, &a.path).cmp(&(b.family, &b.path)));
        devices
    }

    fn open_path(api: &HidApi, path: &str) -> Result<HidDevice, TransportError> {
        let c_path = CString::new(path)
            .map_err(|e| TransportError::Internal(format!("invalid device path: {e}")))?;
        Ok(api.open_path(&c_path)?)
    }

    async fn probe_version(
        &self,
        desc: &DeviceDescriptor,
        device: HidDevice,
    ) -> Option<String> {
        let transport = Arc::new(HidTransport::new(device, desc.transport_info()));
        let channel = PacketChannel::new(transport);
        match channel
            .request_with_timeout(PacketId::GetFirmwareVersion, &[], self.probe_timeout_ms)
            .await
        {
            Ok(reply) if reply.id == PacketId::Ok => {
                Some(String::from_utf8_lossy(&reply.data).into_owned())
            }
            Ok(reply) => {
                debug!("{} answered version probe with {}", desc.path, reply.id);
                None
            }
            Err(e) => {
                debug!("Version probe on {} failed: {}", desc.path, e);
                None
            }
        }
    }
}

#[async_trait]
impl DeviceDiscovery for HidDiscovery {
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        // HidApi stays inside this block; only opened handles cross awaits
        let candidates: Vec<(DeviceDescriptor, Option<HidDevice>)> = {
            let api = HidApi::new()?;
            Self::enumerate(&api)
                .into_iter()
                .map(|desc| {
                    let handle = if self.probe && desc.mode == DeviceMode::Normal {
                        match Self::open_path(&api, &desc.path) {
                            Ok(h) => Some(h),
                            Err(e) => {
                                warn!("Cannot open {}: {}", desc.path, e);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    (desc, handle)
                })
                .collect()
        };

        let mut devices = Vec::with_capacity(candidates.len());
        for (mut desc, handle) in candidates {
            if desc.mode == DeviceMode::Bootloader {
                desc.firmware_version = Some(BOOTLOADER_VERSION.to_string());
            } else if self.probe {
                let Some(handle) = handle else { continue };
                match self.probe_version(&desc, handle).await {
                    Some(version) => desc.firmware_version = Some(version),
                    None => continue,
                }
            }
            devices.push(desc);
        }

        info!("Found {} device(s)", devices.len());
        Ok(devices)
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        // classification is re-checked so a hand-built descriptor cannot
        // smuggle in an unsupported device
        device_registry::classify(device.vid, device.pid)?;

        let api = HidApi::new()?;
        let present = api
            .device_list()
            .any(|d| d.path().to_string_lossy() == device.path.as_str());
        if !present {
            return Err(TransportError::DeviceNotFound(device.path.clone()));
        }

        let handle = Self::open_path(&api, &device.path)?;
        info!("Opened {}", device);
        Ok(Arc::new(HidTransport::new(handle, device.transport_info())))
    }
}
