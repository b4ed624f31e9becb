//! Simulated Meowpad/Meowboard firmware for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use meowpad_keyboard::codec;
use meowpad_keyboard::{Configuration, LightingConfig, Meowpad, SessionManager};
use meowpad_transport::{
    DeviceDescriptor, DeviceDiscovery, DeviceFamily, DeviceMode, MockTransport, Packet,
    PacketChannel, PacketId, Transport, TransportError,
};
use parking_lot::Mutex;

/// Firmware state behind a mock transport
pub struct FakeFirmware {
    pub family: DeviceFamily,
    pub keys: Vec<u8>,
    pub light: Vec<u8>,
    pub saved_keys: Vec<u8>,
    pub saved_light: Vec<u8>,
    pub calibrating: Vec<bool>,
    pub learned: Vec<bool>,
}

impl FakeFirmware {
    pub fn new(family: DeviceFamily) -> Self {
        let keys = codec::encode(family, &Configuration::default_for(family)).unwrap();
        let light = LightingConfig::default_for(family)
            .map(|l| codec::encode_lighting(family, &l).unwrap())
            .unwrap_or_default();
        let n = family.key_count();
        Self {
            family,
            saved_keys: keys.clone(),
            saved_light: light.clone(),
            keys,
            light,
            calibrating: vec![false; n],
            learned: vec![true; n],
        }
    }

    /// Every calibrating key finishes range learning
    pub fn finish_calibration(&mut self) {
        for i in 0..self.calibrating.len() {
            if self.calibrating[i] {
                self.calibrating[i] = false;
                self.learned[i] = true;
            }
        }
    }

    fn state(&self, i: usize) -> u8 {
        if self.calibrating[i] {
            2
        } else {
            1
        }
    }

    fn board_half(&self, half: usize, f: impl Fn(usize) -> u8) -> Vec<u8> {
        (half * 32..half * 32 + 32)
            .map(|i| if i < self.calibrating.len() { f(i) } else { 0 })
            .collect()
    }

    fn handle(&mut self, req: &Packet) -> Option<Packet> {
        let ok = |data: Vec<u8>| Some(Packet::new(PacketId::Ok, data));
        let board = self.family.is_board();
        let arg = req.data.first().copied().unwrap_or(0) as usize;
        match req.id {
            PacketId::Ping => Some(Packet::empty(PacketId::Ping)),
            PacketId::GetDeviceName => ok(b"MEOWPAD".to_vec()),
            PacketId::GetFirmwareVersion => ok(b"1.5.2".to_vec()),
            PacketId::GetStatus if board => ok(vec![1, 1, 1]),
            PacketId::GetStatus => ok(vec![1, 1, 1, 1]),
            PacketId::GetKeyConfig => ok(self.keys.clone()),
            PacketId::GetLightConfig => ok(self.light.clone()),
            PacketId::SetKeyConfig => {
                self.keys = req.data.clone();
                ok(Vec::new())
            }
            PacketId::SetLightConfig => {
                self.light = req.data.clone();
                ok(Vec::new())
            }
            PacketId::SaveKeyConfig => {
                self.saved_keys = self.keys.clone();
                ok(Vec::new())
            }
            PacketId::SaveLightConfig => {
                self.saved_light = self.light.clone();
                ok(Vec::new())
            }
            PacketId::CalibrationKey => {
                let selected: Vec<usize> = if board {
                    req.data.iter().map(|&b| b as usize).collect()
                } else {
                    (0..self.calibrating.len()).collect()
                };
                for i in selected {
                    self.calibrating[i] = true;
                    self.learned[i] = false;
                }
                ok(Vec::new())
            }
            PacketId::Debug if board => {
                let mut data = Vec::new();
                for i in arg * 8..arg * 8 + 8 {
                    data.extend_from_slice(&[0x08, i as u8, 0x08, 0x00, 0, self.state(i)]);
                }
                ok(data)
            }
            PacketId::Debug => {
                let mut data = Vec::new();
                for i in 0..self.calibrating.len() {
                    data.extend_from_slice(&[0x08, i as u8, 0x08, 0x00, 0, 10, 0, self.state(i)]);
                }
                ok(data)
            }
            PacketId::CalibrateKeyStatus => ok(self.board_half(arg, |i| self.learned[i] as u8)),
            PacketId::DebugKeyState => ok(self.board_half(arg, |i| self.state(i))),
            PacketId::GetHallConfig => {
                let keys = if board { 8 } else { self.calibrating.len() };
                let mut data = Vec::new();
                for _ in 0..keys {
                    data.extend_from_slice(&[0x0F, 0x00, 0x01, 0x00, 0x08, 0x00]);
                }
                ok(data)
            }
            PacketId::DebugValue => {
                let count = [30, 30, 4][arg.min(2)];
                ok((0..count).flat_map(|i: u16| (0x800 + i).to_be_bytes()).collect())
            }
            PacketId::ClearKeyConfig
            | PacketId::ClearLightConfig
            | PacketId::ClearHallConfig
            | PacketId::SetMiddlePoint
            | PacketId::EraseFirmware
            | PacketId::Reset => ok(Vec::new()),
            _ => Some(Packet::empty(PacketId::Bad)),
        }
    }
}

pub fn descriptor(family: DeviceFamily) -> DeviceDescriptor {
    let (vid, pid, name) = match family {
        DeviceFamily::ThreeKey => (0x5D3E, 0xFE17, "Meowpad SE"),
        DeviceFamily::FourKey => (0x5D3E, 0xFE07, "Meowpad"),
        DeviceFamily::Board(_) => (0x2E3C, 0x5745, "Meowboard PURE64"),
    };
    DeviceDescriptor {
        path: format!("mock-{family}"),
        vid,
        pid,
        interface_number: 1,
        family,
        mode: DeviceMode::Normal,
        name: name.into(),
        firmware_version: None,
        serial: None,
    }
}

/// Mock transport running a [`FakeFirmware`]
pub fn fake_device(family: DeviceFamily) -> (Arc<MockTransport>, Arc<Mutex<FakeFirmware>>) {
    let firmware = Arc::new(Mutex::new(FakeFirmware::new(family)));
    let fw = Arc::clone(&firmware);
    let transport = MockTransport::packet_device(descriptor(family).transport_info(), move |req| {
        fw.lock().handle(req)
    });
    (Arc::new(transport), firmware)
}

/// Open session over a fresh fake device
pub fn open(family: DeviceFamily) -> (Arc<Meowpad>, Arc<MockTransport>, Arc<Mutex<FakeFirmware>>) {
    let (transport, firmware) = fake_device(family);
    let channel = PacketChannel::new(transport.clone() as Arc<dyn Transport>).with_report_delay(0);
    let pad = Meowpad::from_channel(descriptor(family), channel).unwrap();
    (Arc::new(pad), transport, firmware)
}

/// Discovery over a fixed set of fake devices
pub struct FakeDiscovery {
    pub devices: Vec<(DeviceDescriptor, Arc<MockTransport>)>,
}

#[async_trait]
impl DeviceDiscovery for FakeDiscovery {
    async fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        Ok(self.devices.iter().map(|(d, _)| d.clone()).collect())
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        self.devices
            .iter()
            .find(|(d, _)| d.path == device.path)
            .map(|(_, t)| Arc::clone(t) as Arc<dyn Transport>)
            .ok_or_else(|| TransportError::DeviceNotFound(device.path.clone()))
    }
}

pub fn manager(families: &[DeviceFamily]) -> (SessionManager, Vec<Arc<MockTransport>>) {
    let mut devices = Vec::new();
    for &family in families {
        let (transport, _) = fake_device(family);
        devices.push((descriptor(family), transport));
    }
    let transports = devices.iter().map(|(_, t)| Arc::clone(t)).collect();
    let manager = SessionManager::new(FakeDiscovery { devices }).with_report_delay(0);
    (manager, transports)
}
