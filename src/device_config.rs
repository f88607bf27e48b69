//! Device configuration
//!
//! Immutable per-device descriptors loaded once at startup from a JSON file.
//! Each entry names the sensor, its notification chats, the debounce window
//! and the snapshot sources attached to it.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    2000
}

fn default_label_high() -> String {
    "opening".to_string()
}

fn default_label_low() -> String {
    "closing".to_string()
}

fn default_delays() -> Vec<u64> {
    vec![0]
}

/// How a snapshot source produces its image URL
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotKind {
    /// Precomputed snapshot URL, fetched directly
    Direct { url: String },
    /// Camera id resolved through the external camera directory
    Discovered { camera_id: String },
}

/// One configured camera plus its list of capture delays
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSourceConfig {
    #[serde(flatten)]
    pub kind: SnapshotKind,
    /// Capture delays in ms, measured from pipeline trigger time
    #[serde(default = "default_delays")]
    pub delays_ms: Vec<u64>,
}

/// Immutable descriptor for one monitored device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Unique device id (board id of the sensor bridge)
    pub device_id: String,
    /// Display label used as message prefix
    pub label: String,
    /// Primary notification chat
    pub chat_id: i64,
    /// Escalation chat for initial observations and errors
    pub escalation_chat_id: i64,
    /// Debounce window in ms
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Notify when the sensor settles on High
    #[serde(default = "default_true")]
    pub notify_on_high: bool,
    /// Notify when the sensor settles on Low
    #[serde(default = "default_true")]
    pub notify_on_low: bool,
    /// Display text for the High state
    #[serde(default = "default_label_high")]
    pub label_high: String,
    /// Display text for the Low state
    #[serde(default = "default_label_low")]
    pub label_low: String,
    /// Snapshot sources attached to this device
    #[serde(default)]
    pub snapshots: Vec<SnapshotSourceConfig>,
}

/// Load device descriptors from a JSON file
pub fn load_devices(path: &Path) -> Result<Vec<DeviceConfig>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read devices file {}: {}", path.display(), e))
    })?;

    let devices: Vec<DeviceConfig> = serde_json::from_str(&raw)?;

    if devices.is_empty() {
        return Err(Error::Config("devices file contains no devices".to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    for device in &devices {
        if !seen.insert(device.device_id.clone()) {
            return Err(Error::Config(format!(
                "duplicate device id: {}",
                device.device_id
            )));
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_device() {
        let json = r#"[{
            "device_id": "gate-1",
            "label": "Gate",
            "chat_id": -100200,
            "escalation_chat_id": -100300
        }]"#;
        let devices: Vec<DeviceConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(devices.len(), 1);
        let d = &devices[0];
        assert_eq!(d.debounce_ms, 2000);
        assert!(d.notify_on_high);
        assert!(d.notify_on_low);
        assert_eq!(d.label_high, "opening");
        assert_eq!(d.label_low, "closing");
        assert!(d.snapshots.is_empty());
    }

    #[test]
    fn test_parse_snapshot_sources() {
        let json = r#"[{
            "device_id": "gate-1",
            "label": "Gate",
            "chat_id": -100200,
            "escalation_chat_id": -100300,
            "notify_on_low": false,
            "snapshots": [
                {"kind": "direct", "url": "http://cam.local/snap.jpg", "delays_ms": [0, 3000]},
                {"kind": "discovered", "camera_id": "42"}
            ]
        }]"#;
        let devices: Vec<DeviceConfig> = serde_json::from_str(json).unwrap();
        let d = &devices[0];
        assert!(!d.notify_on_low);
        assert_eq!(d.snapshots.len(), 2);
        assert_eq!(d.snapshots[0].delays_ms, vec![0, 3000]);
        assert!(matches!(d.snapshots[0].kind, SnapshotKind::Direct { .. }));
        assert_eq!(d.snapshots[1].delays_ms, vec![0]);
        assert!(
            matches!(&d.snapshots[1].kind, SnapshotKind::Discovered { camera_id } if camera_id == "42")
        );
    }
}
