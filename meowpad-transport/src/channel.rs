//! Request/response channel
//!
//! `PacketChannel` wraps a raw `Transport` (which only moves single HID
//! reports) and adds packet semantics: fragmentation, reply reassembly with
//! continuation acks, and serialization of request/response cycles.
//!
//! ```text
//! [HidTransport / MockTransport]   <- implements Transport (raw I/O)
//!               |
//!        [PacketChannel]           <- framing, acks, one request in flight
//!               |
//!     [Meowpad / IapProgrammer]
//! ```
//!
//! Nothing here retries. A failed exchange is returned to the caller as is.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{timing, Packet, PacketId, ReplyAssembler, REPORT_SIZE};
use crate::types::TransportDeviceInfo;
use crate::Transport;

pub struct PacketChannel {
    inner: Arc<dyn Transport>,
    read_timeout_ms: u32,
    report_delay_ms: u64,
    /// Serializes request/response cycles. Without it concurrent tasks
    /// interleave their reports and read each other's replies.
    query_lock: tokio::sync::Mutex<()>,
}

impl PacketChannel {
    pub fn new(inner: Arc<dyn Transport>) -> Self {
        Self {
            inner,
            read_timeout_ms: timing::READ_TIMEOUT_MS,
            report_delay_ms: timing::INTER_REPORT_DELAY_MS,
            query_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the per-report read timeout
    pub fn with_read_timeout(mut self, ms: u32) -> Self {
        self.read_timeout_ms = ms;
        self
    }

    /// Override the gap between output reports of one packet
    pub fn with_report_delay(mut self, ms: u64) -> Self {
        self.report_delay_ms = ms;
        self
    }

    /// Access the wrapped raw transport.
    pub fn inner(&self) -> &Arc<dyn Transport> {
        &self.inner
    }

    pub fn device_info(&self) -> &TransportDeviceInfo {
        self.inner.device_info()
    }

    pub fn read_timeout_ms(&self) -> u32 {
        self.read_timeout_ms
    }

    // ========================================================================
    // Packet exchange
    // ========================================================================

    /// Send a request and wait for the full reply
    pub async fn request(&self, id: PacketId, data: &[u8]) -> Result<Packet, TransportError> {
        self.request_with_timeout(id, data, self.read_timeout_ms)
            .await
    }

    /// Same as [`request`](Self::request) with an explicit read bound
    pub async fn request_with_timeout(
        &self,
        id: PacketId,
        data: &[u8],
        timeout_ms: u32,
    ) -> Result<Packet, TransportError> {
        let _guard = self.query_lock.lock().await;
        let packet = Packet::new(id, data);
        debug!("Sending {}", packet);
        self.write_packet(&packet).await?;
        let reply = self.read_packet(timeout_ms).await?;
        debug!("Reply to {}: {}", id, reply);
        Ok(reply)
    }

    async fn write_packet(&self, packet: &Packet) -> Result<(), TransportError> {
        let reports = packet.to_reports()?;
        let count = reports.len();
        for (i, report) in reports.iter().enumerate() {
            self.inner.write_report(report).await?;
            if self.report_delay_ms > 0 && i + 1 < count {
                tokio::time::sleep(Duration::from_millis(self.report_delay_ms)).await;
            }
        }
        Ok(())
    }

    async fn read_packet(&self, timeout_ms: u32) -> Result<Packet, TransportError> {
        let first = self.inner.read_report(timeout_ms).await?;
        let mut assembler = ReplyAssembler::start(&first)?;
        while !assembler.is_complete() {
            let ack = assembler.next_ack();
            debug!("Requesting continuation {:?}", ack.data);
            self.write_packet(&ack).await?;
            let next = self.inner.read_report(timeout_ms).await?;
            assembler.push(&next)?;
        }
        Ok(assembler.finish())
    }

    // ========================================================================
    // Raw report exchange (bootloader)
    // ========================================================================

    /// Write one prebuilt report and read one raw reply
    pub async fn exchange_report(
        &self,
        report: &[u8; REPORT_SIZE],
    ) -> Result<Vec<u8>, TransportError> {
        let _guard = self.query_lock.lock().await;
        self.inner.write_report(report).await?;
        self.inner.read_report(self.read_timeout_ms).await
    }

    /// Write one prebuilt report without waiting for a reply
    pub async fn send_report(&self, report: &[u8; REPORT_SIZE]) -> Result<(), TransportError> {
        let _guard = self.query_lock.lock().await;
        self.inner.write_report(report).await
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.is_connected().await
    }

    pub async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}
