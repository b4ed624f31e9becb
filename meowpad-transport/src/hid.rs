//! hidapi-backed transport for USB-attached devices

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::PAYLOAD_SIZE;
use crate::types::TransportDeviceInfo;
use crate::Transport;

/// HID transport over interrupt reports
///
/// Any hidapi failure on an open handle is reported as `Disconnected`; the
/// device only fails that way when it left the bus or was reset.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    info: TransportDeviceInfo,
    closed: AtomicBool,
}

impl HidTransport {
    pub fn new(device: HidDevice, info: TransportDeviceInfo) -> Self {
        Self {
            device: Mutex::new(device),
            info,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Disconnected)
        } else {
            Ok(())
        }
    }

    fn lost(&self, e: hidapi::HidError) -> TransportError {
        debug!("HID I/O failed on {}: {}", self.info.device_path, e);
        self.closed.store(true, Ordering::SeqCst);
        TransportError::Disconnected
    }
}

#[async_trait]
impl Transport for HidTransport {
    async fn write_report(&self, report: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let device = self.device.lock();
        device.write(report).map_err(|e| self.lost(e))?;
        Ok(())
    }

    async fn read_report(&self, timeout_ms: u32) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        let mut buf = vec![0u8; PAYLOAD_SIZE];
        let timeout = i32::try_from(timeout_ms).unwrap_or(i32::MAX);
        let n = {
            let device = self.device.lock();
            device
                .read_timeout(&mut buf, timeout)
                .map_err(|e| self.lost(e))?
        };
        if n == 0 {
            return Err(TransportError::Timeout);
        }
        buf.truncate(n);
        Ok(buf)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
