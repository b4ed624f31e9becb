//! Integration tests against a connected device.
//!
//! These tests require a Meowpad or Meowboard to be plugged in.
//! Run with: cargo test -p meowpad-keyboard --test device_queries -- --ignored --nocapture

use std::sync::Arc;
use std::time::Duration;

use meowpad_keyboard::{codec, Meowpad, SessionManager};
use meowpad_transport::HidDiscovery;

/// Connect to the first non-bootloader device, the way the CLI does
async fn open_device() -> (SessionManager, Arc<Meowpad>) {
    let manager = SessionManager::new(HidDiscovery::probing(500));
    let devices = manager.list_devices().await.expect("enumeration failed");
    let descriptor = devices
        .into_iter()
        .find(|d| !d.is_bootloader())
        .expect("No device found - plug in a supported device");
    println!("Using {descriptor}");
    let pad = manager
        .select_and_connect(&descriptor)
        .await
        .expect("connect failed");
    (manager, pad)
}

/// Identity, status and config reads issued concurrently all resolve
#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn concurrent_queries_resolve() {
    let (_manager, pad) = open_device().await;

    let h_name = {
        let pad = Arc::clone(&pad);
        tokio::spawn(async move { pad.get_device_name().await })
    };
    let h_version = {
        let pad = Arc::clone(&pad);
        tokio::spawn(async move { pad.get_firmware_version().await })
    };
    let h_status = {
        let pad = Arc::clone(&pad);
        tokio::spawn(async move { pad.get_status().await })
    };
    let h_config = {
        let pad = Arc::clone(&pad);
        tokio::spawn(async move { pad.get_config().await })
    };

    let all = async {
        (
            h_name.await.unwrap(),
            h_version.await.unwrap(),
            h_status.await.unwrap(),
            h_config.await.unwrap(),
        )
    };
    let (name, version, status, config) = tokio::time::timeout(Duration::from_secs(5), all)
        .await
        .expect("queries did not resolve within 5s");

    println!("name:    {:?}", name);
    println!("version: {:?}", version);
    println!("status:  {:?}", status);
    let config = config.expect("get_config failed");
    assert_eq!(config.key_count(), pad.key_count());
}

/// Raw config read back from the device passes its own structural check
#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn raw_config_is_valid() {
    let (_manager, pad) = open_device().await;
    let raw = pad.get_raw_config().await.expect("get_raw_config failed");
    assert_eq!(raw.len(), codec::expected_size(pad.family()));
    assert!(pad.check_raw_config(&raw));
}

/// Live sensor readings cover every key
#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn debug_values_cover_all_keys() {
    let (_manager, pad) = open_device().await;
    let values = pad.get_debug_values().await.expect("get_debug_values failed");
    assert_eq!(values.len(), pad.key_count());
    for (i, v) in values.iter().enumerate() {
        println!(
            "key {:2}: adc={:5} linear={:5} press={:3}% {:?}",
            i, v.adc_value, v.linear_value, v.press_percentage, v.key_state
        );
    }
}
