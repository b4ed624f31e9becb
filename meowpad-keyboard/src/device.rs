//! One open Meowpad/Meowboard
//!
//! [`Meowpad`] owns the packet channel to a single device and exposes every
//! typed request the firmware understands. Calls are serialized by the
//! channel; nothing is retried. Once the device is closed (explicitly or by
//! a detected disconnect) every call, including those already waiting on the
//! device, resolves to [`KeyboardError::DeviceDisconnected`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meowpad_transport::{
    DeviceDescriptor, DeviceFamily, Packet, PacketChannel, PacketId, Transport,
};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{Configuration, LightingConfig};
use crate::error::KeyboardError;
use crate::status::{
    self, DeviceInfo, DeviceStatus, KeyCalibration, KeyHallConfig, KeyRtStatus, KeyState,
    Reader, BOARD_HALF_KEYS, BOARD_PAGE_KEYS, BOARD_VALUE_PAGES,
};
use crate::validator;

/// Result of a set-then-save sequence
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Staged and persisted to flash
    Saved,
    /// At least partly staged in volatile memory; a later step failed
    StagedNotSaved(KeyboardError),
}

impl ApplyOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, ApplyOutcome::Saved)
    }
}

pub struct Meowpad {
    descriptor: DeviceDescriptor,
    channel: PacketChannel,
    closed: AtomicBool,
    shutdown: Notify,
}

impl Meowpad {
    /// Wrap an opened transport
    pub fn new(
        descriptor: DeviceDescriptor,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, KeyboardError> {
        Self::from_channel(descriptor, PacketChannel::new(transport))
    }

    /// Wrap a preconfigured channel (custom timeouts, test pacing)
    pub fn from_channel(
        descriptor: DeviceDescriptor,
        channel: PacketChannel,
    ) -> Result<Self, KeyboardError> {
        if descriptor.is_bootloader() {
            return Err(KeyboardError::NotSupported(format!(
                "{} is in bootloader mode",
                descriptor.name
            )));
        }
        info!("Session opened: {}", descriptor);
        Ok(Self {
            descriptor,
            channel,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn family(&self) -> DeviceFamily {
        self.descriptor.family
    }

    pub fn key_count(&self) -> usize {
        self.descriptor.family.key_count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Invalidate the session and release the transport
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.notify_waiters();
        if let Err(e) = self.channel.close().await {
            debug!("Closing transport: {}", e);
        }
        info!("Session closed: {}", self.descriptor.name);
    }

    fn mark_disconnected(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            warn!("{} disconnected", self.descriptor.name);
            self.shutdown.notify_waiters();
        }
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// One request/response cycle; resolves early when the session is closed
    async fn exchange(&self, id: PacketId, data: &[u8]) -> Result<Packet, KeyboardError> {
        // registered before the closed check so a concurrent close cannot slip between
        let shutdown = self.shutdown.notified();
        if self.is_closed() {
            return Err(KeyboardError::DeviceDisconnected);
        }
        let result = tokio::select! {
            biased;
            _ = shutdown => return Err(KeyboardError::DeviceDisconnected),
            r = self.channel.request(id, data) => r,
        };
        result.map_err(|e| {
            let err = KeyboardError::from(e);
            if matches!(err, KeyboardError::DeviceDisconnected) {
                self.mark_disconnected();
            }
            err
        })
    }

    /// Request expecting an `Ok` reply; returns its body
    async fn command(&self, id: PacketId, data: &[u8]) -> Result<Vec<u8>, KeyboardError> {
        let reply = self.exchange(id, data).await?;
        if reply.id != PacketId::Ok {
            return Err(KeyboardError::UnexpectedResponse(format!(
                "{} answered with {}",
                id, reply.id
            )));
        }
        Ok(reply.data)
    }

    fn require_lighting(&self) -> Result<(), KeyboardError> {
        if self.family().has_lighting() {
            Ok(())
        } else {
            Err(KeyboardError::NotSupported(format!(
                "{} has no lighting",
                self.descriptor.name
            )))
        }
    }

    /// Number of `per_page` sized pages covering every key
    fn pages(&self, per_page: usize) -> Result<u8, KeyboardError> {
        let pages = self.key_count().div_ceil(per_page);
        u8::try_from(pages).map_err(|_| {
            KeyboardError::InvalidParameter(format!("{pages} pages do not fit a page index"))
        })
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Liveness check; `false` when the device answers with anything but an echo
    pub async fn ping(&self) -> Result<bool, KeyboardError> {
        let reply = self.exchange(PacketId::Ping, &[]).await?;
        Ok(reply.id == PacketId::Ping)
    }

    pub async fn get_device_name(&self) -> Result<String, KeyboardError> {
        let data = self.command(PacketId::GetDeviceName, &[]).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub async fn get_firmware_version(&self) -> Result<String, KeyboardError> {
        let data = self.command(PacketId::GetFirmwareVersion, &[]).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub async fn get_device_info(&self) -> Result<DeviceInfo, KeyboardError> {
        Ok(DeviceInfo {
            name: self.get_device_name().await?,
            firmware_version: self.get_firmware_version().await?,
        })
    }

    pub async fn get_status(&self) -> Result<DeviceStatus, KeyboardError> {
        let data = self.command(PacketId::GetStatus, &[]).await?;
        status::parse_status(&data, self.family().has_lighting())
    }

    // ========================================================================
    // Key configuration
    // ========================================================================

    pub async fn get_config(&self) -> Result<Configuration, KeyboardError> {
        let data = self.command(PacketId::GetKeyConfig, &[]).await?;
        codec::decode(self.family(), &data)
    }

    /// Stage a configuration in volatile memory
    ///
    /// Encoding happens before any I/O; an invalid config never reaches the device.
    pub async fn set_config(&self, config: &Configuration) -> Result<(), KeyboardError> {
        let bytes = codec::encode(self.family(), config)?;
        debug!("Staging {} byte key config", bytes.len());
        self.command(PacketId::SetKeyConfig, &bytes).await?;
        Ok(())
    }

    /// Persist the staged key configuration
    pub async fn save_config(&self) -> Result<(), KeyboardError> {
        self.command(PacketId::SaveKeyConfig, &[]).await?;
        Ok(())
    }

    /// Stage then save; a failed save is reported, not returned as an error
    pub async fn apply_config(&self, config: &Configuration) -> Result<ApplyOutcome, KeyboardError> {
        self.set_config(config).await?;
        Ok(Self::outcome(self.save_config().await))
    }

    fn outcome(save: Result<(), KeyboardError>) -> ApplyOutcome {
        match save {
            Ok(()) => ApplyOutcome::Saved,
            Err(e) => {
                warn!("Config staged but not saved: {}", e);
                ApplyOutcome::StagedNotSaved(e)
            }
        }
    }

    // ========================================================================
    // Lighting
    // ========================================================================

    pub async fn get_light_config(&self) -> Result<LightingConfig, KeyboardError> {
        self.require_lighting()?;
        let data = self.command(PacketId::GetLightConfig, &[]).await?;
        codec::decode_lighting(self.family(), &data)
    }

    pub async fn set_light_config(&self, config: &LightingConfig) -> Result<(), KeyboardError> {
        self.require_lighting()?;
        let bytes = codec::encode_lighting(self.family(), config)?;
        self.command(PacketId::SetLightConfig, &bytes).await?;
        Ok(())
    }

    pub async fn save_light_config(&self) -> Result<(), KeyboardError> {
        self.require_lighting()?;
        self.command(PacketId::SaveLightConfig, &[]).await?;
        Ok(())
    }

    pub async fn apply_light_config(
        &self,
        config: &LightingConfig,
    ) -> Result<ApplyOutcome, KeyboardError> {
        self.set_light_config(config).await?;
        Ok(Self::outcome(self.save_light_config().await))
    }

    // ========================================================================
    // Raw configuration
    // ========================================================================

    /// Key block followed by the light block, checked before it is returned
    pub async fn get_raw_config(&self) -> Result<Vec<u8>, KeyboardError> {
        let mut raw = self.command(PacketId::GetKeyConfig, &[]).await?;
        if self.family().has_lighting() {
            raw.extend(self.command(PacketId::GetLightConfig, &[]).await?);
        }
        validator::validate(self.family(), &raw)?;
        Ok(raw)
    }

    /// Validate, stage and save every block of a raw config
    pub async fn set_raw_config(&self, raw: &[u8]) -> Result<ApplyOutcome, KeyboardError> {
        validator::validate(self.family(), raw)?;
        let (keys, light) = codec::split_raw(self.family(), raw)?;

        self.command(PacketId::SetKeyConfig, keys).await?;
        // the key block is live from here on
        Ok(Self::outcome(self.stage_light_and_save(light).await))
    }

    async fn stage_light_and_save(&self, light: Option<&[u8]>) -> Result<(), KeyboardError> {
        if let Some(light) = light {
            self.command(PacketId::SetLightConfig, light).await?;
        }
        self.save_config().await?;
        if light.is_some() {
            self.save_light_config().await?;
        }
        Ok(())
    }

    /// Structural check against this device's family
    pub fn check_raw_config(&self, raw: &[u8]) -> bool {
        validator::is_valid(self.family(), raw)
    }

    /// Reset key, light and hall configuration to firmware defaults
    pub async fn clear_config(&self) -> Result<(), KeyboardError> {
        self.command(PacketId::ClearKeyConfig, &[]).await?;
        if self.family().has_lighting() {
            self.command(PacketId::ClearLightConfig, &[]).await?;
        }
        self.command(PacketId::ClearHallConfig, &[]).await?;
        Ok(())
    }

    // ========================================================================
    // Sensors
    // ========================================================================

    /// Re-learn the rest position of every key
    pub async fn set_middle_point(&self) -> Result<(), KeyboardError> {
        self.command(PacketId::SetMiddlePoint, &[]).await?;
        Ok(())
    }

    /// Live reading of every key
    pub async fn get_debug_values(&self) -> Result<Vec<KeyRtStatus>, KeyboardError> {
        let keys = self.key_count();
        if !self.family().is_board() {
            let data = self.command(PacketId::Debug, &[]).await?;
            return status::parse_keypad_debug(&data, keys);
        }
        let mut out = Vec::with_capacity(keys);
        for page in 0..self.pages(BOARD_PAGE_KEYS)? {
            let data = self.command(PacketId::Debug, &[page]).await?;
            out.extend(status::parse_board_debug_page(&data)?);
        }
        out.truncate(keys);
        Ok(out)
    }

    /// Per-key state without the analog readings
    pub async fn get_key_states(&self) -> Result<Vec<KeyState>, KeyboardError> {
        if !self.family().is_board() {
            return Ok(self
                .get_debug_values()
                .await?
                .into_iter()
                .map(|k| k.key_state)
                .collect());
        }
        let data = self.board_halves(PacketId::DebugKeyState).await?;
        data.into_iter()
            .map(|b| KeyState::try_from(u16::from(b)))
            .collect()
    }

    /// Raw ADC value of every key (board only)
    pub async fn get_key_values(&self) -> Result<Vec<u16>, KeyboardError> {
        if !self.family().is_board() {
            return Err(KeyboardError::NotSupported(
                "bulk ADC values are a board command".into(),
            ));
        }
        let keys = self.key_count();
        let mut out = Vec::with_capacity(keys);
        for (page, count) in (0u8..).zip(BOARD_VALUE_PAGES.iter()) {
            if out.len() >= keys {
                break;
            }
            let data = self.command(PacketId::DebugValue, &[page]).await?;
            let mut r = Reader::new(&data, "DebugValue");
            for _ in 0..*count {
                out.push(r.u16()?);
            }
        }
        out.truncate(keys);
        Ok(out)
    }

    /// Learned sensor ranges
    pub async fn get_hall_config(&self) -> Result<Vec<KeyHallConfig>, KeyboardError> {
        let keys = self.key_count();
        if !self.family().is_board() {
            let data = self.command(PacketId::GetHallConfig, &[]).await?;
            return status::parse_hall_config(&data, keys);
        }
        let mut out = Vec::with_capacity(keys);
        for page in 0..self.pages(BOARD_PAGE_KEYS)? {
            let data = self.command(PacketId::GetHallConfig, &[page]).await?;
            out.extend(status::parse_hall_config(&data, BOARD_PAGE_KEYS)?);
        }
        out.truncate(keys);
        Ok(out)
    }

    /// Two 32-byte halves of a per-key byte table
    async fn board_halves(&self, id: PacketId) -> Result<Vec<u8>, KeyboardError> {
        let keys = self.key_count();
        let mut out = Vec::with_capacity(keys);
        for half in 0..self.pages(BOARD_HALF_KEYS)? {
            let data = self.command(id, &[half]).await?;
            let chunk = data.get(..BOARD_HALF_KEYS).ok_or_else(|| {
                KeyboardError::UnexpectedResponse(format!("{} reply too short", id))
            })?;
            out.extend_from_slice(chunk);
        }
        out.truncate(keys);
        Ok(out)
    }

    // ========================================================================
    // Calibration
    // ========================================================================

    /// Start hall range learning
    ///
    /// Boards learn exactly the listed keys. Keypads always recalibrate every
    /// key, so `keys` is only range checked there.
    pub async fn calibrate_keys(&self, keys: &[usize]) -> Result<(), KeyboardError> {
        let count = self.key_count();
        if let Some(bad) = keys.iter().find(|&&k| k >= count) {
            return Err(KeyboardError::InvalidParameter(format!(
                "key index {bad} out of range (0..{count})"
            )));
        }
        let body: Vec<u8> = if self.family().is_board() {
            keys.iter()
                .map(|&k| {
                    u8::try_from(k).map_err(|_| {
                        KeyboardError::InvalidParameter(format!("key index {k} exceeds a byte"))
                    })
                })
                .collect::<Result<_, _>>()?
        } else {
            Vec::new()
        };
        info!("Calibrating {} key(s)", keys.len());
        self.command(PacketId::CalibrationKey, &body).await?;
        Ok(())
    }

    /// Calibration progress of every key
    pub async fn get_calibration_report(&self) -> Result<Vec<KeyCalibration>, KeyboardError> {
        let debug = self.get_debug_values().await?;
        if !self.family().is_board() {
            return Ok(debug
                .into_iter()
                .map(|k| {
                    let calibrating = k.key_state == KeyState::Calibrating;
                    KeyCalibration {
                        calibrated: !calibrating,
                        calibrating,
                        adc_value: k.adc_value,
                        press_percentage: k.press_percentage,
                    }
                })
                .collect());
        }
        let learned = self.board_halves(PacketId::CalibrateKeyStatus).await?;
        let states = self.get_key_states().await?;
        Ok(debug
            .iter()
            .zip(learned)
            .zip(states)
            .map(|((k, learned), state)| KeyCalibration {
                calibrated: learned != 0,
                calibrating: state == KeyState::Calibrating,
                adc_value: k.adc_value,
                press_percentage: k.press_percentage,
            })
            .collect())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Wipe the application firmware; the device reboots into its bootloader
    pub async fn erase_firmware(&self) -> Result<(), KeyboardError> {
        warn!("Erasing firmware on {}", self.descriptor.name);
        self.command(PacketId::EraseFirmware, &[]).await?;
        Ok(())
    }

    pub async fn reset_device(&self) -> Result<(), KeyboardError> {
        self.command(PacketId::Reset, &[]).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Meowpad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meowpad")
            .field("device", &self.descriptor.name)
            .field("family", &self.descriptor.family)
            .field("closed", &self.is_closed())
            .finish()
    }
}
