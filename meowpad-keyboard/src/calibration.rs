//! Interactive hall sensor calibration
//!
//! ```text
//! key:     Idle -> Calibrating -> Calibrated
//!                      |
//!                      +-> Idle       (cancel / disconnect)
//! session: NotStarted -> Running -> Settled
//! ```
//!
//! The caller drives progress by polling. A key only becomes `Calibrated`
//! after the device confirms a run that started after `start`: the key must
//! first be seen calibrating (or, on boards, with its "range learned" flag
//! cleared). Boards are then done once the flag is set again; keypads once
//! the key leaves the calibrating state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::device::Meowpad;
use crate::error::KeyboardError;

/// Slots tracked per session; covers the largest board
pub const MAX_CALIBRATION_KEYS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum KeyCalibrationState {
    #[default]
    Idle,
    Calibrating,
    Calibrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CalibrationPhase {
    #[default]
    NotStarted,
    Running,
    Settled,
}

/// Latest view of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KeyProgress {
    pub state: KeyCalibrationState,
    pub adc_value: u16,
    pub press_percentage: u8,
}

impl KeyProgress {
    pub fn is_calibrated(&self) -> bool {
        self.state == KeyCalibrationState::Calibrated
    }

    pub fn is_calibrating(&self) -> bool {
        self.state == KeyCalibrationState::Calibrating
    }
}

pub struct CalibrationSession {
    device: Arc<Meowpad>,
    keys: [KeyProgress; MAX_CALIBRATION_KEYS],
    /// Device has shown a run in progress for the key since start
    seen_calibrating: [bool; MAX_CALIBRATION_KEYS],
    phase: CalibrationPhase,
    ended: bool,
}

impl CalibrationSession {
    pub fn new(device: Arc<Meowpad>) -> Self {
        Self {
            device,
            keys: [KeyProgress::default(); MAX_CALIBRATION_KEYS],
            seen_calibrating: [false; MAX_CALIBRATION_KEYS],
            phase: CalibrationPhase::NotStarted,
            ended: false,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    /// Progress of the device's keys (only the first `key_count` slots)
    pub fn keys(&self) -> &[KeyProgress] {
        &self.keys[..self.key_count()]
    }

    pub fn key_state(&self, index: usize) -> Option<KeyCalibrationState> {
        self.keys().get(index).map(|k| k.state)
    }

    /// Keys still waiting for the device
    pub fn pending(&self) -> usize {
        self.keys().iter().filter(|k| k.is_calibrating()).count()
    }

    pub fn is_settled(&self) -> bool {
        self.phase == CalibrationPhase::Settled
    }

    fn key_count(&self) -> usize {
        self.device.key_count().min(MAX_CALIBRATION_KEYS)
    }

    fn ensure_live(&self) -> Result<(), KeyboardError> {
        if self.ended || self.device.is_closed() {
            return Err(KeyboardError::DeviceDisconnected);
        }
        Ok(())
    }

    fn revert_calibrating(&mut self) {
        for key in self.keys.iter_mut().filter(|k| k.is_calibrating()) {
            key.state = KeyCalibrationState::Idle;
        }
    }

    /// A disconnect ends the session and releases every waiting key
    fn on_error(&mut self, e: &KeyboardError) {
        if matches!(e, KeyboardError::DeviceDisconnected) {
            info!("Calibration ended by disconnect");
            self.revert_calibrating();
            self.ended = true;
            self.phase = CalibrationPhase::Settled;
        }
    }

    /// Begin (or restart) range learning for `indices`
    ///
    /// Keys outside `indices` keep their state. On failure the selected keys
    /// are back in `Idle`.
    pub async fn start(&mut self, indices: &[usize]) -> Result<(), KeyboardError> {
        self.ensure_live()?;
        let count = self.key_count();
        if let Some(bad) = indices.iter().find(|&&i| i >= count) {
            return Err(KeyboardError::InvalidParameter(format!(
                "key index {bad} out of range (0..{count})"
            )));
        }
        let mut selected = indices.to_vec();
        selected.sort_unstable();
        selected.dedup();

        for &i in &selected {
            self.keys[i].state = KeyCalibrationState::Calibrating;
            self.seen_calibrating[i] = false;
        }
        self.phase = CalibrationPhase::Running;

        if let Err(e) = self.device.calibrate_keys(&selected).await {
            for &i in &selected {
                self.keys[i].state = KeyCalibrationState::Idle;
            }
            self.on_error(&e);
            if self.pending() == 0 {
                self.phase = CalibrationPhase::Settled;
            }
            return Err(e);
        }
        info!("Calibration started for {} key(s)", selected.len());
        Ok(())
    }

    /// Read the device once and advance the per-key states
    pub async fn poll(&mut self) -> Result<&[KeyProgress], KeyboardError> {
        self.ensure_live()?;
        let report = match self.device.get_calibration_report().await {
            Ok(r) => r,
            Err(e) => {
                self.on_error(&e);
                return Err(e);
            }
        };

        let board = self.device.family().is_board();
        for (i, reading) in report.iter().enumerate().take(self.key_count()) {
            let key = &mut self.keys[i];
            key.adc_value = reading.adc_value;
            key.press_percentage = reading.press_percentage;
            if !key.is_calibrating() {
                continue;
            }
            if reading.calibrating || (board && !reading.calibrated) {
                self.seen_calibrating[i] = true;
            }
            // a learned flag left over from an earlier run does not count
            let done = self.seen_calibrating[i]
                && !reading.calibrating
                && (!board || reading.calibrated);
            if done {
                debug!("Key {} calibrated", i);
                key.state = KeyCalibrationState::Calibrated;
            }
        }

        if self.phase == CalibrationPhase::Running && self.pending() == 0 {
            info!("Calibration settled");
            self.phase = CalibrationPhase::Settled;
        }
        Ok(self.keys())
    }

    /// Stop waiting; keys not yet confirmed go back to `Idle`
    ///
    /// Local only: the firmware keeps whatever it learned so far.
    pub fn cancel(&mut self) {
        self.revert_calibrating();
        if self.phase == CalibrationPhase::Running {
            self.phase = CalibrationPhase::Settled;
        }
    }
}
