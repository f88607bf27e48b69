//! Signal source capability
//!
//! Narrow interface over the hardware transport: the debounce monitor only
//! needs to read the current raw value of a device at timer expiry. Event
//! delivery (readings, connectivity changes) flows through the
//! `DeviceRegistry` entry points instead of a subscription object.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Raw binary sensor level as reported by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLevel {
    Low,
    High,
}

impl RawLevel {
    /// Parse a wire value (0/1)
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RawLevel::Low),
            1 => Some(RawLevel::High),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            RawLevel::Low => 0,
            RawLevel::High => 1,
        }
    }
}

/// Read access to the current raw value of a device
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Read the current raw value for a device
    async fn read_current(&self, device_id: &str) -> crate::Result<RawLevel>;
}

/// Signal source for push-style devices
///
/// Devices without a persistent link POST their value to the ingress API;
/// the latest value per device is kept here so the debounce monitor reads
/// what is current at timer expiry, not what scheduled the timer.
pub struct PushSignalSource {
    values: RwLock<HashMap<String, RawLevel>>,
}

impl PushSignalSource {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }

    /// Record the latest pushed value for a device
    pub async fn update(&self, device_id: &str, level: RawLevel) {
        self.values
            .write()
            .await
            .insert(device_id.to_string(), level);
    }
}

impl Default for PushSignalSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalSource for PushSignalSource {
    async fn read_current(&self, device_id: &str) -> crate::Result<RawLevel> {
        self.values
            .read()
            .await
            .get(device_id)
            .copied()
            .ok_or_else(|| crate::Error::NotFound(format!("no reading yet for {}", device_id)))
    }
}
