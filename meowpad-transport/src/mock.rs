//! In-memory transport
//!
//! `MockTransport` stands in for a device in tests and offline tooling. It
//! either answers raw reports through a closure, or (via
//! [`MockTransport::packet_device`]) emulates the device side of the packet
//! framing so handlers only deal with whole [`Packet`]s.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{Packet, PacketId, CONTINUATION_MARKER, HEADER_SIZE, PAYLOAD_SIZE};
use crate::types::TransportDeviceInfo;
use crate::Transport;

type ReportHandler = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

pub struct MockTransport {
    info: TransportDeviceInfo,
    handler: Mutex<ReportHandler>,
    inbox: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
    requests: Arc<Mutex<Vec<Packet>>>,
    connected: Arc<AtomicBool>,
    drop_on: Arc<Mutex<Option<PacketId>>>,
}

impl MockTransport {
    /// Device answering raw output reports with zero or more input reports
    pub fn raw_device<F>(info: TransportDeviceInfo, handler: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        Self {
            info,
            handler: Mutex::new(Box::new(handler)),
            inbox: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            drop_on: Arc::new(Mutex::new(None)),
        }
    }

    /// Device answering whole request packets
    ///
    /// The handler returns `None` to stay silent (the host then times out).
    pub fn packet_device<F>(info: TransportDeviceInfo, handler: F) -> Self
    where
        F: FnMut(&Packet) -> Option<Packet> + Send + 'static,
    {
        let mut mock = Self::raw_device(info, |_| Vec::new());
        let mut device = PacketDevice {
            handler: Box::new(handler),
            rx: None,
            pending: VecDeque::new(),
            pending_id: None,
            requests: Arc::clone(&mock.requests),
            connected: Arc::clone(&mock.connected),
            drop_on: Arc::clone(&mock.drop_on),
        };
        mock.handler = Mutex::new(Box::new(move |report| device.on_report(report)));
        mock
    }

    /// Sever the link; every later call fails with `Disconnected`
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Sever the link as soon as a request with `id` arrives, before replying
    pub fn disconnect_on(&self, id: PacketId) {
        *self.drop_on.lock() = Some(id);
    }

    /// Requests seen by a packet device (acks excluded)
    pub fn requests(&self) -> Vec<Packet> {
        self.requests.lock().clone()
    }

    /// Ids of the requests seen so far
    pub fn request_ids(&self) -> Vec<PacketId> {
        self.requests.lock().iter().map(|p| p.id).collect()
    }

    /// Every output report written, report ID included
    pub fn written_reports(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_report(&self, report: &[u8]) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.written.lock().push(report.to_vec());
        let replies = {
            let mut handler = self.handler.lock();
            (*handler)(report)
        };
        self.inbox.lock().extend(replies);
        Ok(())
    }

    async fn read_report(&self, _timeout_ms: u32) -> Result<Vec<u8>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        self.inbox.lock().pop_front().ok_or(TransportError::Timeout)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.disconnect();
        Ok(())
    }
}

// ============================================================================
// Device-side framing
// ============================================================================

/// Partially received request: (id byte, declared length, body so far)
type RxState = (u8, usize, Vec<u8>);

struct PacketDevice {
    handler: Box<dyn FnMut(&Packet) -> Option<Packet> + Send>,
    rx: Option<RxState>,
    pending: VecDeque<Vec<u8>>,
    pending_id: Option<PacketId>,
    requests: Arc<Mutex<Vec<Packet>>>,
    connected: Arc<AtomicBool>,
    drop_on: Arc<Mutex<Option<PacketId>>>,
}

impl PacketDevice {
    fn on_report(&mut self, report: &[u8]) -> Vec<Vec<u8>> {
        let payload = report.get(1..).unwrap_or_default();
        if payload.is_empty() {
            return Vec::new();
        }

        match self.rx.take() {
            Some((id, len, mut body)) if payload[0] == CONTINUATION_MARKER => {
                let want = len - body.len();
                body.extend_from_slice(&payload[1..want.min(payload.len() - 1) + 1]);
                self.rx = Some((id, len, body));
            }
            _ => {
                if payload.len() < HEADER_SIZE {
                    return Vec::new();
                }
                let len = u16::from_be_bytes([payload[1], payload[2]]) as usize;
                let rest = &payload[HEADER_SIZE..];
                let body = rest[..len.min(rest.len())].to_vec();
                self.rx = Some((payload[0], len, body));
            }
        }

        match &self.rx {
            Some((_, len, body)) if body.len() >= *len => {}
            _ => return Vec::new(),
        }
        let Some((id, _, body)) = self.rx.take() else {
            return Vec::new();
        };
        let Ok(id) = PacketId::try_from(id) else {
            debug!("Mock device ignoring unknown packet id {}", id);
            return Vec::new();
        };
        self.dispatch(Packet::new(id, body))
    }

    fn dispatch(&mut self, packet: Packet) -> Vec<Vec<u8>> {
        if self.pending_id == Some(packet.id) && packet.data.len() == 1 {
            if let Some(chunk) = self.pending.pop_front() {
                if self.pending.is_empty() {
                    self.pending_id = None;
                }
                return vec![chunk];
            }
        }
        self.pending.clear();
        self.pending_id = None;

        self.requests.lock().push(packet.clone());
        if *self.drop_on.lock() == Some(packet.id) {
            self.connected.store(false, Ordering::SeqCst);
            return Vec::new();
        }

        let Some(reply) = (self.handler)(&packet) else {
            return Vec::new();
        };
        let Ok(encoded) = reply.encode() else {
            return Vec::new();
        };

        let first_len = encoded.len().min(PAYLOAD_SIZE);
        let mut first = vec![0u8; PAYLOAD_SIZE];
        first[..first_len].copy_from_slice(&encoded[..first_len]);

        for chunk in encoded[first_len..].chunks(PAYLOAD_SIZE) {
            let mut report = vec![0u8; PAYLOAD_SIZE];
            report[..chunk.len()].copy_from_slice(chunk);
            self.pending.push_back(report);
        }
        if !self.pending.is_empty() {
            self.pending_id = Some(reply.id);
        }
        vec![first]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> TransportDeviceInfo {
        TransportDeviceInfo {
            vid: 0x5D3E,
            pid: 0xFE08,
            device_path: "mock".into(),
            serial: None,
            product_name: None,
        }
    }

    #[tokio::test]
    async fn test_raw_device_replies() {
        let mock = MockTransport::raw_device(info(), |report| vec![vec![report[1], 0]]);
        mock.write_report(&[0, 0x81]).await.unwrap();
        assert_eq!(mock.read_report(10).await.unwrap(), vec![0x81, 0]);
        assert!(matches!(
            mock.read_report(10).await,
            Err(TransportError::Timeout)
        ));
        assert_eq!(mock.written_reports(), vec![vec![0, 0x81]]);
    }

    #[tokio::test]
    async fn test_disconnect_on_request() {
        let mock = MockTransport::packet_device(info(), |_| Some(Packet::empty(PacketId::Ok)));
        mock.disconnect_on(PacketId::SaveKeyConfig);

        let report = Packet::empty(PacketId::SaveKeyConfig).to_reports().unwrap();
        mock.write_report(&report[0]).await.unwrap();
        assert!(!mock.is_connected().await);
        assert!(matches!(
            mock.read_report(10).await,
            Err(TransportError::Disconnected)
        ));
        assert_eq!(mock.request_ids(), vec![PacketId::SaveKeyConfig]);
    }
}
