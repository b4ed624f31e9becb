//! Session behavior against simulated firmware

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{descriptor, manager, open};
use meowpad_keyboard::{
    codec, ApplyOutcome, Configuration, KeyCode, KeyboardError, LightingMode, Meowpad,
};
use meowpad_transport::{
    DeviceDescriptor, DeviceFamily, DeviceMode, MockTransport, Packet, PacketId, Transport,
    TransportDeviceInfo, TransportError,
};

const BOARD: DeviceFamily = DeviceFamily::Board(64);

#[tokio::test]
async fn test_identity_queries() {
    let (pad, _, _) = open(DeviceFamily::FourKey);
    assert!(pad.ping().await.unwrap());
    let info = pad.get_device_info().await.unwrap();
    assert_eq!(info.name, "MEOWPAD");
    assert_eq!(info.firmware_version, "1.5.2");

    let status = pad.get_status().await.unwrap();
    assert!(status.key);
    assert_eq!(status.light, Some(true));

    let (board, _, _) = open(BOARD);
    assert_eq!(board.get_status().await.unwrap().light, None);
}

#[tokio::test]
async fn test_set_then_get_config() {
    let (pad, transport, firmware) = open(DeviceFamily::FourKey);
    let mut config = pad.get_config().await.unwrap();
    let Configuration::FourKey(ref mut four) = config else {
        panic!("expected a 4K config");
    };
    four.keys[0].press = 40;
    four.keys[0].actions = vec![KeyCode::A, KeyCode::LShift];
    four.jitter_ms = 3;

    pad.set_config(&config).await.unwrap();
    assert_eq!(pad.get_config().await.unwrap(), config);
    // staged only
    let fw = firmware.lock();
    assert_ne!(fw.keys, fw.saved_keys);
    assert!(!transport.request_ids().contains(&PacketId::SaveKeyConfig));
}

#[tokio::test]
async fn test_apply_config_persists() {
    let (pad, _, firmware) = open(DeviceFamily::ThreeKey);
    let mut config = Configuration::default_for(DeviceFamily::ThreeKey);
    if let Configuration::ThreeKey(ref mut three) = config {
        three.side_button = vec![KeyCode::F13];
    }
    let outcome = pad.apply_config(&config).await.unwrap();
    assert!(outcome.is_saved());
    let fw = firmware.lock();
    assert_eq!(fw.saved_keys, codec::encode(DeviceFamily::ThreeKey, &config).unwrap());
}

#[tokio::test]
async fn test_apply_config_save_lost() {
    let (pad, transport, _) = open(DeviceFamily::FourKey);
    transport.disconnect_on(PacketId::SaveKeyConfig);

    let config = Configuration::default_for(DeviceFamily::FourKey);
    match pad.apply_config(&config).await.unwrap() {
        ApplyOutcome::StagedNotSaved(KeyboardError::DeviceDisconnected) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(pad.is_closed());
    assert!(matches!(
        pad.get_config().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
}

#[tokio::test]
async fn test_operations_fail_after_disconnect() {
    let (pad, transport, _) = open(DeviceFamily::FourKey);
    transport.disconnect();
    assert!(matches!(
        pad.get_device_name().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
    assert!(pad.is_closed());
    assert!(matches!(
        pad.ping().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
}

#[tokio::test]
async fn test_closed_session_rejects_requests() {
    let (pad, transport, _) = open(DeviceFamily::FourKey);
    pad.close().await;
    assert!(matches!(
        pad.get_config().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
    assert!(transport.requests().is_empty());
}

/// Accepts every report and never answers
struct SilentTransport {
    info: TransportDeviceInfo,
}

#[async_trait]
impl Transport for SilentTransport {
    async fn write_report(&self, _report: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    async fn read_report(&self, _timeout_ms: u32) -> Result<Vec<u8>, TransportError> {
        std::future::pending().await
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_close_resolves_waiting_request() {
    let desc = descriptor(DeviceFamily::FourKey);
    let transport = Arc::new(SilentTransport {
        info: desc.transport_info(),
    });
    let pad = Arc::new(Meowpad::new(desc, transport).unwrap());

    let waiting = tokio::spawn({
        let pad = Arc::clone(&pad);
        async move { pad.get_config().await }
    });
    // let the request reach the read
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiting.is_finished());

    pad.close().await;
    let result = tokio::time::timeout(Duration::from_secs(1), waiting)
        .await
        .expect("request still waiting after close")
        .unwrap();
    assert!(matches!(result, Err(KeyboardError::DeviceDisconnected)));
}

#[tokio::test]
async fn test_invalid_config_never_sent() {
    let (pad, transport, _) = open(DeviceFamily::FourKey);
    let mut config = Configuration::default_for(DeviceFamily::FourKey);
    if let Configuration::FourKey(ref mut four) = config {
        four.keys[1].press = 101;
    }
    assert!(matches!(
        pad.set_config(&config).await,
        Err(KeyboardError::InvalidField { .. })
    ));
    assert!(!transport.request_ids().contains(&PacketId::SetKeyConfig));
}

#[tokio::test]
async fn test_lighting() {
    let (pad, _, firmware) = open(DeviceFamily::FourKey);
    let mut light = pad.get_light_config().await.unwrap();
    light.mode = LightingMode::BreatheGlow;
    light.max_brightness = 60;
    assert!(pad.apply_light_config(&light).await.unwrap().is_saved());
    assert_eq!(pad.get_light_config().await.unwrap(), light);
    {
        let fw = firmware.lock();
        assert_eq!(fw.light, fw.saved_light);
    }

    let (board, _, _) = open(BOARD);
    assert!(matches!(
        board.get_light_config().await,
        Err(KeyboardError::NotSupported(_))
    ));
}

#[tokio::test]
async fn test_raw_config_roundtrip() {
    let (pad, _, firmware) = open(DeviceFamily::FourKey);
    let raw = pad.get_raw_config().await.unwrap();
    assert_eq!(raw.len(), codec::expected_size(DeviceFamily::FourKey));
    assert!(pad.check_raw_config(&raw));

    let mut edited = raw.clone();
    // first key press threshold, doubled on the wire
    edited[0] = 80;
    assert!(pad.set_raw_config(&edited).await.unwrap().is_saved());
    assert_eq!(pad.get_raw_config().await.unwrap(), edited);
    assert_eq!(firmware.lock().saved_keys[0], 80);
}

#[tokio::test]
async fn test_raw_config_light_stage_lost() {
    let (pad, transport, firmware) = open(DeviceFamily::FourKey);
    let mut edited = pad.get_raw_config().await.unwrap();
    edited[0] = 80;
    transport.disconnect_on(PacketId::SetLightConfig);

    // key block already staged, so this is not a plain error
    match pad.set_raw_config(&edited).await.unwrap() {
        ApplyOutcome::StagedNotSaved(KeyboardError::DeviceDisconnected) => {}
        other => panic!("unexpected outcome {other:?}"),
    }
    let fw = firmware.lock();
    assert_eq!(fw.keys[0], 80);
    assert_ne!(fw.saved_keys[0], 80);
}

#[tokio::test]
async fn test_raw_config_rejected_before_io() {
    let (pad, transport, _) = open(BOARD);
    let short = vec![0u8; 10];
    assert!(!pad.check_raw_config(&short));
    assert!(matches!(
        pad.set_raw_config(&short).await,
        Err(KeyboardError::MalformedConfig(_))
    ));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_board_sensor_reads() {
    let (pad, transport, _) = open(BOARD);
    let debug = pad.get_debug_values().await.unwrap();
    assert_eq!(debug.len(), 64);
    assert_eq!(debug[9].linear_value, 0x0800);
    assert_eq!(debug[9].adc_value, 0x0809);

    assert_eq!(pad.get_key_values().await.unwrap().len(), 64);
    assert_eq!(pad.get_hall_config().await.unwrap().len(), 64);
    assert_eq!(pad.get_key_states().await.unwrap().len(), 64);

    let pages = transport
        .requests()
        .into_iter()
        .filter(|p| p.id == PacketId::Debug)
        .map(|p| p.data[0])
        .collect::<Vec<_>>();
    assert_eq!(pages, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_keypad_sensor_reads() {
    let (pad, _, _) = open(DeviceFamily::ThreeKey);
    assert_eq!(pad.get_debug_values().await.unwrap().len(), 3);
    assert_eq!(pad.get_hall_config().await.unwrap().len(), 3);
    assert!(matches!(
        pad.get_key_values().await,
        Err(KeyboardError::NotSupported(_))
    ));
}

#[tokio::test]
async fn test_calibrate_keys_range_checked() {
    let (pad, transport, _) = open(BOARD);
    assert!(matches!(
        pad.calibrate_keys(&[64]).await,
        Err(KeyboardError::InvalidParameter(_))
    ));
    assert!(transport.requests().is_empty());

    pad.calibrate_keys(&[0, 5]).await.unwrap();
    let sent = transport.requests();
    assert_eq!(sent[0].id, PacketId::CalibrationKey);
    assert_eq!(sent[0].data, vec![0, 5]);
}

#[tokio::test]
async fn test_key_index_beyond_a_byte_rejected() {
    let family = DeviceFamily::Board(300);
    let desc = descriptor(family);
    let transport = Arc::new(MockTransport::packet_device(desc.transport_info(), |_| {
        Some(Packet::empty(PacketId::Ok))
    }));
    let pad = Meowpad::new(desc, transport.clone()).unwrap();
    assert!(matches!(
        pad.calibrate_keys(&[299]).await,
        Err(KeyboardError::InvalidParameter(_))
    ));
    assert!(transport.requests().is_empty());
}

// ============================================================================
// Session manager
// ============================================================================

#[tokio::test]
async fn test_manager_lists_and_connects() {
    let (manager, _) = manager(&[DeviceFamily::FourKey, BOARD]);
    let devices = manager.list_devices().await.unwrap();
    assert_eq!(devices.len(), 2);

    assert!(matches!(
        manager.active().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
    let pad = manager.select_and_connect(&devices[0]).await.unwrap();
    assert_eq!(pad.family(), DeviceFamily::FourKey);
    assert_eq!(
        manager.active_descriptor().await.map(|d| d.family),
        Some(DeviceFamily::FourKey)
    );
}

#[tokio::test]
async fn test_manager_replaces_previous_session() {
    let (manager, _) = manager(&[DeviceFamily::FourKey, BOARD]);
    let first = manager
        .select_and_connect(&descriptor(DeviceFamily::FourKey))
        .await
        .unwrap();
    let second = manager.select_and_connect(&descriptor(BOARD)).await.unwrap();

    assert!(first.is_closed());
    assert!(matches!(
        first.get_config().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
    assert!(second.get_config().await.is_ok());
    assert!(manager.disconnect().await);
    assert!(!manager.disconnect().await);
}

#[tokio::test]
async fn test_manager_rejects_unknown_device() {
    let (manager, _) = manager(&[DeviceFamily::FourKey]);
    let stranger = DeviceDescriptor {
        vid: 0x1234,
        pid: 0x5678,
        ..descriptor(DeviceFamily::FourKey)
    };
    assert!(matches!(
        manager.select_and_connect(&stranger).await,
        Err(KeyboardError::UnknownDevice {
            vid: 0x1234,
            pid: 0x5678
        })
    ));
}

#[tokio::test]
async fn test_manager_rejects_bootloader_session() {
    let (manager, _) = manager(&[DeviceFamily::FourKey]);
    let iap = DeviceDescriptor {
        pid: 0xFE08,
        mode: DeviceMode::Bootloader,
        ..descriptor(DeviceFamily::FourKey)
    };
    assert!(matches!(
        manager.select_and_connect(&iap).await,
        Err(KeyboardError::NotSupported(_))
    ));
}

#[tokio::test]
async fn test_manager_clears_dropped_session() {
    let (manager, transports) = manager(&[DeviceFamily::FourKey]);
    let pad = manager
        .select_and_connect(&descriptor(DeviceFamily::FourKey))
        .await
        .unwrap();
    transports[0].disconnect();
    assert!(pad.ping().await.is_err());
    assert!(matches!(
        manager.active().await,
        Err(KeyboardError::DeviceDisconnected)
    ));
    assert!(manager.active_descriptor().await.is_none());
}
