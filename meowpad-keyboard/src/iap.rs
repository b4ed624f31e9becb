//! Bootloader (IAP) firmware transfer
//!
//! The image is erased, written in 60-byte chunks, then read back chunk by
//! chunk for verification. Each command is one raw report answered by a
//! two-byte status; `End` is not answered.

use std::sync::Arc;

use meowpad_transport::protocol::{iap_status_ok, IAP_CHUNK_SIZE};
use meowpad_transport::{DeviceDescriptor, IapCommand, IapPacket, PacketChannel, Transport};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::KeyboardError;

/// Largest image the 16-bit flash address can cover
pub const MAX_FIRMWARE_SIZE: usize = u16::MAX as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IapState {
    Idle,
    Programming,
    Verifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IapProgress {
    pub state: IapState,
    /// Bytes written (or verified) so far
    pub address: usize,
    pub total: usize,
}

pub struct IapProgrammer {
    descriptor: DeviceDescriptor,
    channel: PacketChannel,
    state: IapState,
    address: usize,
    total: usize,
}

impl IapProgrammer {
    pub fn new(
        descriptor: DeviceDescriptor,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, KeyboardError> {
        Self::from_channel(descriptor, PacketChannel::new(transport))
    }

    pub fn from_channel(
        descriptor: DeviceDescriptor,
        channel: PacketChannel,
    ) -> Result<Self, KeyboardError> {
        if !descriptor.is_bootloader() {
            return Err(KeyboardError::NotSupported(format!(
                "{} is not in bootloader mode",
                descriptor.name
            )));
        }
        Ok(Self {
            descriptor,
            channel,
            state: IapState::Idle,
            address: 0,
            total: 0,
        })
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn progress(&self) -> IapProgress {
        IapProgress {
            state: self.state,
            address: self.address,
            total: self.total,
        }
    }

    async fn send(&self, packet: &IapPacket, what: &str) -> Result<(), KeyboardError> {
        let reply = self.channel.exchange_report(&packet.to_report()).await?;
        if !iap_status_ok(&reply) {
            return Err(KeyboardError::IapTransferFailed(format!(
                "{what} at 0x{:04X} rejected with {:02X?}",
                packet.addr(),
                &reply[..reply.len().min(2)]
            )));
        }
        Ok(())
    }

    fn expect_state(&self, state: IapState) -> Result<(), KeyboardError> {
        if self.state != state {
            return Err(KeyboardError::IapTransferFailed(format!(
                "expected {:?} state, programmer is {:?}",
                state, self.state
            )));
        }
        Ok(())
    }

    /// Erase flash and start programming an image of `total_len` bytes
    pub async fn begin(&mut self, total_len: usize) -> Result<(), KeyboardError> {
        if total_len == 0 || total_len > MAX_FIRMWARE_SIZE {
            return Err(KeyboardError::InvalidParameter(format!(
                "firmware size {total_len} outside 1..={MAX_FIRMWARE_SIZE}"
            )));
        }
        info!("Erasing flash for a {} byte image", total_len);
        self.send(&IapPacket::erase(), "erase").await?;
        self.state = IapState::Programming;
        self.address = 0;
        self.total = total_len;
        Ok(())
    }

    async fn transfer(&mut self, cmd: IapCommand, chunk: &[u8]) -> Result<usize, KeyboardError> {
        let take = chunk.len().min(IAP_CHUNK_SIZE).min(self.total - self.address);
        if take == 0 {
            return Ok(0);
        }
        let addr = u16::try_from(self.address).map_err(|_| {
            KeyboardError::IapTransferFailed(format!("address {} past flash end", self.address))
        })?;
        let packet = IapPacket::data(cmd, addr, &chunk[..take])?;
        self.send(&packet, &format!("{cmd:?}")).await?;
        self.address += take;
        debug!("{:?} {}/{}", cmd, self.address, self.total);
        Ok(take)
    }

    /// Program up to 60 bytes at the current address; returns bytes accepted
    pub async fn push_chunk(&mut self, chunk: &[u8]) -> Result<usize, KeyboardError> {
        self.expect_state(IapState::Programming)?;
        self.transfer(IapCommand::Program, chunk).await
    }

    /// Rewind to the start of the image for read-back verification
    pub fn begin_verify(&mut self) -> Result<(), KeyboardError> {
        self.expect_state(IapState::Programming)?;
        self.state = IapState::Verifying;
        self.address = 0;
        Ok(())
    }

    /// Verify up to 60 bytes at the current address; returns bytes checked
    pub async fn verify_chunk(&mut self, chunk: &[u8]) -> Result<usize, KeyboardError> {
        self.expect_state(IapState::Verifying)?;
        self.transfer(IapCommand::Verify, chunk).await
    }

    /// End the transfer; the bootloader boots the new image
    pub async fn flush(&mut self) -> Result<(), KeyboardError> {
        self.channel.send_report(&IapPacket::end().to_report()).await?;
        self.state = IapState::Idle;
        info!("IAP transfer finished ({} bytes)", self.total);
        Ok(())
    }

    /// Full program + verify cycle
    pub async fn flash<F>(&mut self, firmware: &[u8], mut on_progress: F) -> Result<(), KeyboardError>
    where
        F: FnMut(IapProgress),
    {
        self.begin(firmware.len()).await?;
        for chunk in firmware.chunks(IAP_CHUNK_SIZE) {
            self.push_chunk(chunk).await?;
            on_progress(self.progress());
        }
        self.begin_verify()?;
        for chunk in firmware.chunks(IAP_CHUNK_SIZE) {
            self.verify_chunk(chunk).await?;
            on_progress(self.progress());
        }
        self.flush().await?;
        on_progress(self.progress());
        Ok(())
    }
}
