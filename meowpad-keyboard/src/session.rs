//! Active-session selector
//!
//! At most one device is active at a time. Connecting to a new device closes
//! the previous session first, under the same lock, so no caller ever sees
//! two live sessions. Which device to open is always the caller's choice.

use std::sync::Arc;

use meowpad_transport::{DeviceDescriptor, DeviceDiscovery, PacketChannel};
use tokio::sync::Mutex;
use tracing::info;

use crate::device::Meowpad;
use crate::error::KeyboardError;
use crate::iap::IapProgrammer;

pub struct SessionManager {
    discovery: Box<dyn DeviceDiscovery>,
    active: Mutex<Option<Arc<Meowpad>>>,
    read_timeout_ms: Option<u32>,
    report_delay_ms: Option<u64>,
}

impl SessionManager {
    pub fn new(discovery: impl DeviceDiscovery + 'static) -> Self {
        Self {
            discovery: Box::new(discovery),
            active: Mutex::new(None),
            read_timeout_ms: None,
            report_delay_ms: None,
        }
    }

    /// Read bound applied to every session opened from here on
    pub fn with_read_timeout(mut self, ms: u32) -> Self {
        self.read_timeout_ms = Some(ms);
        self
    }

    /// Output report pacing applied to every session opened from here on
    pub fn with_report_delay(mut self, ms: u64) -> Self {
        self.report_delay_ms = Some(ms);
        self
    }

    /// Selectable devices; empty when nothing is attached
    pub async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, KeyboardError> {
        Ok(self.discovery.list_devices().await?)
    }

    async fn open_channel(&self, descriptor: &DeviceDescriptor) -> Result<PacketChannel, KeyboardError> {
        // signatures outside the registry never get a session
        meowpad_transport::classify(descriptor.vid, descriptor.pid)?;
        let transport = self.discovery.open_device(descriptor).await?;
        let mut channel = PacketChannel::new(transport);
        if let Some(ms) = self.read_timeout_ms {
            channel = channel.with_read_timeout(ms);
        }
        if let Some(ms) = self.report_delay_ms {
            channel = channel.with_report_delay(ms);
        }
        Ok(channel)
    }

    /// Close the current session (if any) and open `descriptor`
    pub async fn select_and_connect(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<Arc<Meowpad>, KeyboardError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            info!("Replacing session {}", previous.descriptor().name);
            previous.close().await;
        }
        if descriptor.is_bootloader() {
            return Err(KeyboardError::NotSupported(format!(
                "{} is in bootloader mode; use the IAP programmer",
                descriptor.name
            )));
        }
        let channel = self.open_channel(descriptor).await?;
        let pad = Arc::new(Meowpad::from_channel(descriptor.clone(), channel)?);
        *active = Some(Arc::clone(&pad));
        Ok(pad)
    }

    /// Close the current session and open a bootloader for flashing
    pub async fn connect_bootloader(
        &self,
        descriptor: &DeviceDescriptor,
    ) -> Result<IapProgrammer, KeyboardError> {
        self.disconnect().await;
        let channel = self.open_channel(descriptor).await?;
        IapProgrammer::from_channel(descriptor.clone(), channel)
    }

    /// Close the active session; `false` when there was none
    pub async fn disconnect(&self) -> bool {
        match self.active.lock().await.take() {
            Some(pad) => {
                pad.close().await;
                true
            }
            None => false,
        }
    }

    /// The live session
    ///
    /// A session whose device dropped off is cleared here and reported as
    /// `DeviceDisconnected`.
    pub async fn active(&self) -> Result<Arc<Meowpad>, KeyboardError> {
        let mut active = self.active.lock().await;
        match active.as_ref() {
            Some(pad) if !pad.is_closed() => Ok(Arc::clone(pad)),
            Some(_) => {
                *active = None;
                Err(KeyboardError::DeviceDisconnected)
            }
            None => Err(KeyboardError::DeviceDisconnected),
        }
    }

    pub async fn active_descriptor(&self) -> Option<DeviceDescriptor> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|pad| !pad.is_closed())
            .map(|pad| pad.descriptor().clone())
    }
}
