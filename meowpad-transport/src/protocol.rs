//! Protocol constants and packet framing for Meowpad/Meowboard devices
//!
//! A logical packet is `[id][body_len u16 BE][body]`. It travels over 64-byte
//! HID reports:
//!
//! ```text
//! host -> device   [00][id][len_hi][len_lo][61 body bytes]       first report
//!                  [00][FE][63 body bytes]                       continuation
//! device -> host   [id][len_hi][len_lo][61 body bytes]           first report
//!                  [64 body bytes]                               continuation,
//!                                                                requested by an
//!                                                                ack packet
//! ```

use std::fmt;

use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::TransportError;

/// Output report size including the leading report ID
pub const REPORT_SIZE: usize = 65;
/// Payload bytes per report (without report ID)
pub const PAYLOAD_SIZE: usize = 64;
/// Packet header size: id + u16 length
pub const HEADER_SIZE: usize = 3;
/// First byte of every host continuation report
pub const CONTINUATION_MARKER: u8 = 0xFE;
/// Largest body the u16 length field can describe
pub const MAX_BODY_SIZE: usize = u16::MAX as usize;

/// Timing constants
pub mod timing {
    /// Default bound on a single report read (ms)
    pub const READ_TIMEOUT_MS: u32 = 1000;
    /// Bound on the firmware version probe during enumeration (ms)
    pub const PROBE_TIMEOUT_MS: u32 = 500;
    /// Gap between consecutive output reports of one packet (ms)
    pub const INTER_REPORT_DELAY_MS: u64 = 5;
}

// ============================================================================
// Packet IDs
// ============================================================================

/// Command and reply identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketId {
    Null = 0,
    Ok = 1,
    Bad = 2,
    Ping = 3,
    SetConfig = 5,
    GetConfig = 6,
    GetFirmwareVersion = 7,
    GetDeviceName = 8,
    CalibrationKey = 9,
    EraseFirmware = 10,
    Debug = 11,
    AutoConfig = 12,
    SetMiddlePoint = 13,
    ToggleKeyboard = 14,
    Reset = 15,
    GetStatus = 16,
    DebugValue = 50,
    DebugKeyState = 51,
    CalibrateKeyStatus = 52,
    GetKeyConfig = 100,
    GetLightConfig = 101,
    SetKeyConfig = 102,
    SetLightConfig = 103,
    SaveKeyConfig = 104,
    SaveLightConfig = 105,
    ClearKeyConfig = 106,
    ClearLightConfig = 107,
    GetHallConfig = 108,
    ClearHallConfig = 109,
}

impl TryFrom<u8> for PacketId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use PacketId::*;
        Result::Ok(match value {
            0 => Null,
            1 => Ok,
            2 => Bad,
            3 => Ping,
            5 => SetConfig,
            6 => GetConfig,
            7 => GetFirmwareVersion,
            8 => GetDeviceName,
            9 => CalibrationKey,
            10 => EraseFirmware,
            11 => Debug,
            12 => AutoConfig,
            13 => SetMiddlePoint,
            14 => ToggleKeyboard,
            15 => Reset,
            16 => GetStatus,
            50 => DebugValue,
            51 => DebugKeyState,
            52 => CalibrateKeyStatus,
            100 => GetKeyConfig,
            101 => GetLightConfig,
            102 => SetKeyConfig,
            103 => SetLightConfig,
            104 => SaveKeyConfig,
            105 => SaveLightConfig,
            106 => ClearKeyConfig,
            107 => ClearLightConfig,
            108 => GetHallConfig,
            109 => ClearHallConfig,
            other => return Err(other),
        })
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Packet
// ============================================================================

/// One logical request or reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: PacketId,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(id: PacketId, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Packet with an empty body
    pub fn empty(id: PacketId) -> Self {
        Self::new(id, Vec::new())
    }

    /// Serialize header and body
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        let len = u16::try_from(self.data.len())
            .map_err(|_| TransportError::PacketTooLarge(self.data.len()))?;
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.data.len());
        buf.push(self.id as u8);
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    /// Split into output reports (report ID 0 prepended)
    pub fn to_reports(&self) -> Result<Vec<[u8; REPORT_SIZE]>, TransportError> {
        let encoded = self.encode()?;
        let mut reports = Vec::new();

        let first = encoded.len().min(PAYLOAD_SIZE);
        let mut report = [0u8; REPORT_SIZE];
        report[1..1 + first].copy_from_slice(&encoded[..first]);
        reports.push(report);

        for chunk in encoded[first..].chunks(PAYLOAD_SIZE - 1) {
            let mut report = [0u8; REPORT_SIZE];
            report[1] = CONTINUATION_MARKER;
            report[2..2 + chunk.len()].copy_from_slice(chunk);
            reports.push(report);
        }
        Ok(reports)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet (id: {}, len: {})", self.id, self.data.len())
    }
}

// ============================================================================
// Reply reassembly
// ============================================================================

/// Collects a device reply spread over several input reports
#[derive(Debug)]
pub struct ReplyAssembler {
    id: PacketId,
    expected: usize,
    data: Vec<u8>,
    /// Continuation reports consumed so far
    continuations: u8,
}

impl ReplyAssembler {
    /// Start from the first input report of a reply
    pub fn start(report: &[u8]) -> Result<Self, TransportError> {
        if report.len() < HEADER_SIZE {
            return Err(TransportError::MalformedReport(format!(
                "reply header needs {} bytes, got {}",
                HEADER_SIZE,
                report.len()
            )));
        }
        let id = PacketId::try_from(report[0]).map_err(|raw| {
            TransportError::MalformedReport(format!("unknown packet id {raw}"))
        })?;
        let expected = u16::from_be_bytes([report[1], report[2]]) as usize;
        let mut assembler = Self {
            id,
            expected,
            data: Vec::with_capacity(expected),
            continuations: 0,
        };
        assembler.take(&report[HEADER_SIZE..]);
        Ok(assembler)
    }

    fn take(&mut self, bytes: &[u8]) {
        let want = self.expected - self.data.len();
        self.data.extend_from_slice(&bytes[..want.min(bytes.len())]);
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.expected
    }

    /// Ack that asks the device for the next continuation report
    pub fn next_ack(&self) -> Packet {
        Packet::new(self.id, [self.continuations.wrapping_add(1)])
    }

    /// Append a continuation report
    pub fn push(&mut self, report: &[u8]) -> Result<(), TransportError> {
        if report.is_empty() {
            return Err(TransportError::MalformedReport(
                "empty continuation report".into(),
            ));
        }
        self.continuations = self.continuations.wrapping_add(1);
        self.take(report);
        Ok(())
    }

    pub fn finish(self) -> Packet {
        Packet::new(self.id, self.data)
    }
}

// ============================================================================
// IAP framing
// ============================================================================

/// Bootloader command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IapCommand {
    Program = 0x80,
    Erase = 0x81,
    Verify = 0x82,
    End = 0x83,
}

/// Firmware bytes carried by one IAP report
pub const IAP_CHUNK_SIZE: usize = 60;

/// Wire layout of a bootloader report (without report ID)
///
/// Fields are private; use the constructors so `len` always matches the
/// number of meaningful bytes in `buf`.
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct IapPacket {
    cmd: u8,
    len: u8,
    addr: U16,
    buf: [u8; IAP_CHUNK_SIZE],
}

impl IapPacket {
    /// Program or verify `chunk` at flash offset `addr`
    pub fn data(cmd: IapCommand, addr: u16, chunk: &[u8]) -> Result<Self, TransportError> {
        if chunk.len() > IAP_CHUNK_SIZE {
            return Err(TransportError::PacketTooLarge(chunk.len()));
        }
        let mut buf = [0u8; IAP_CHUNK_SIZE];
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(Self {
            cmd: cmd as u8,
            len: chunk.len() as u8,
            addr: U16::new(addr),
            buf,
        })
    }

    pub fn erase() -> Self {
        Self {
            cmd: IapCommand::Erase as u8,
            len: 0,
            addr: U16::new(0),
            buf: [0; IAP_CHUNK_SIZE],
        }
    }

    /// End of transfer; the bootloader expects a two-byte trailer length
    pub fn end() -> Self {
        Self {
            cmd: IapCommand::End as u8,
            len: 2,
            addr: U16::new(0),
            buf: [0; IAP_CHUNK_SIZE],
        }
    }

    pub fn addr(&self) -> u16 {
        self.addr.get()
    }

    /// Output report with report ID 0
    pub fn to_report(&self) -> [u8; REPORT_SIZE] {
        let mut report = [0u8; REPORT_SIZE];
        report[1..].copy_from_slice(self.as_bytes());
        report
    }
}

/// Check the two-byte status a bootloader sends after each command
pub fn iap_status_ok(reply: &[u8]) -> bool {
    reply.len() >= 2 && reply[0] == 0 && reply[1] == 0
}
