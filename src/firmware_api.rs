// Release manifest client for configurator and firmware update checks

use std::cmp::Ordering;
#[cfg(feature = "firmware-api")]
use std::path::Path;

use meowpad_transport::DeviceFamily;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Request could not be sent or the body could not be read
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {0}")]
    Server(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Firmware line a device ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmwareEdition {
    Starter,
    Standard,
}

impl FirmwareEdition {
    /// Edition published for a family; boards have no published image
    pub fn for_family(family: DeviceFamily) -> Option<Self> {
        match family {
            DeviceFamily::ThreeKey => Some(FirmwareEdition::Starter),
            DeviceFamily::FourKey => Some(FirmwareEdition::Standard),
            DeviceFamily::Board(_) => None,
        }
    }
}

/// Latest image of one edition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareRelease {
    pub edition: FirmwareEdition,
    pub version: String,
    pub download_url: String,
    pub sha256: Option<String>,
}

/// Release manifest as served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub configurator_version: String,
    pub download_url: String,
    #[serde(rename = "v2_starter_edition_latest_firmware_version")]
    pub starter_version: String,
    #[serde(rename = "v2_starter_edition_firmware_download_url")]
    pub starter_download_url: String,
    #[serde(rename = "v2_starter_edition_firmware_sha256", default)]
    pub starter_sha256: Option<String>,
    #[serde(rename = "v2_standard_edition_latest_firmware_version")]
    pub standard_version: String,
    #[serde(rename = "v2_standard_edition_firmware_download_url")]
    pub standard_download_url: String,
    #[serde(rename = "v2_standard_edition_firmware_sha256", default)]
    pub standard_sha256: Option<String>,
}

impl VersionInfo {
    pub fn release(&self, edition: FirmwareEdition) -> FirmwareRelease {
        let (version, url, sha) = match edition {
            FirmwareEdition::Starter => (
                &self.starter_version,
                &self.starter_download_url,
                &self.starter_sha256,
            ),
            FirmwareEdition::Standard => (
                &self.standard_version,
                &self.standard_download_url,
                &self.standard_sha256,
            ),
        };
        FirmwareRelease {
            edition,
            version: version.clone(),
            download_url: url.clone(),
            sha256: sha.clone(),
        }
    }

    /// Newer firmware for a device of `family` running `current`, if any
    pub fn firmware_update_for(
        &self,
        family: DeviceFamily,
        current: &str,
    ) -> Option<FirmwareRelease> {
        let release = self.release(FirmwareEdition::for_family(family)?);
        (compare_version(current, &release.version) == Ordering::Less).then_some(release)
    }

    /// Whether a configurator newer than `current` is published
    pub fn has_newer_configurator(&self, current: &str) -> bool {
        compare_version(current, &self.configurator_version) == Ordering::Less
    }
}

/// Compare dotted numeric versions ("1.2" == "1.2.0")
///
/// Anything that is not purely dotted digits compares `Equal`, so a garbled
/// version never triggers an update.
pub fn compare_version(a: &str, b: &str) -> Ordering {
    fn parts(v: &str) -> Option<Vec<u64>> {
        v.split('.').map(|s| s.parse().ok()).collect()
    }
    let (Some(va), Some(vb)) = (parts(a), parts(b)) else {
        return Ordering::Equal;
    };
    let len = va.len().max(vb.len());
    for i in 0..len {
        let x = va.get(i).copied().unwrap_or(0);
        let y = vb.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Fetch the release manifest (10 s timeout)
#[cfg(feature = "firmware-api")]
pub async fn fetch_version_info(url: &str) -> Result<VersionInfo, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ApiError::Server(response.status().as_u16()));
    }

    response
        .json::<VersionInfo>()
        .await
        .map_err(|e| ApiError::Parse(e.to_string()))
}

/// Download a firmware image to `output`; returns its size
#[cfg(feature = "firmware-api")]
pub async fn download_firmware(url: &str, output: &Path) -> Result<usize, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| ApiError::Network(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ApiError::Server(response.status().as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;

    std::fs::write(output, &bytes)?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> VersionInfo {
        serde_json::from_str(
            r#"{
                "configurator_version": "2.1.0",
                "download_url": "https://example.invalid/configurator",
                "v2_starter_edition_latest_firmware_version": "1.4",
                "v2_starter_edition_firmware_download_url": "https://example.invalid/starter.bin",
                "v2_standard_edition_latest_firmware_version": "1.6.1",
                "v2_standard_edition_firmware_download_url": "https://example.invalid/standard.bin",
                "v2_standard_edition_firmware_sha256": "abc123"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_compare_version() {
        assert_eq!(compare_version("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare_version("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_version("2.0.1", "2.0"), Ordering::Greater);
        assert_eq!(compare_version("1.x", "9.9"), Ordering::Equal);
        assert_eq!(compare_version("", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_manifest_fields() {
        let info = manifest();
        let standard = info.release(FirmwareEdition::Standard);
        assert_eq!(standard.version, "1.6.1");
        assert_eq!(standard.sha256.as_deref(), Some("abc123"));
        assert_eq!(info.release(FirmwareEdition::Starter).sha256, None);
    }

    #[test]
    fn test_firmware_update_for() {
        let info = manifest();
        let update = info.firmware_update_for(DeviceFamily::FourKey, "1.5.2").unwrap();
        assert_eq!(update.edition, FirmwareEdition::Standard);
        assert!(info.firmware_update_for(DeviceFamily::ThreeKey, "1.4.0").is_none());
        assert!(info.firmware_update_for(DeviceFamily::Board(64), "0.1").is_none());
        assert!(info.firmware_update_for(DeviceFamily::FourKey, "IAP").is_none());
    }

    #[test]
    fn test_configurator_check() {
        let info = manifest();
        assert!(info.has_newer_configurator("2.0.9"));
        assert!(!info.has_newer_configurator("2.1"));
    }
}
