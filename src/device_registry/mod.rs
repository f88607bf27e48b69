//! DeviceRegistry - Monitor Ownership and Lookup
//!
//! ## Responsibilities
//!
//! - Owns every device monitor handle, keyed by device id
//! - Entry points for raw readings and connectivity events
//! - Status and chat-scoped identity queries for inbound commands
//!
//! The set of devices is fixed at startup; unknown ids yield NotFound.

use crate::channel_router::state_label;
use crate::device_monitor::{DeviceState, MonitorEvent, MonitorHandle};
use crate::error::{Error, Result};
use crate::signal_source::RawLevel;
use std::collections::HashMap;

/// Answer to a status query
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub device_id: String,
    pub state: DeviceState,
    /// "{label}: {state text}" display line
    pub text: String,
    pub last_transition_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Registry of all device monitors
pub struct DeviceRegistry {
    monitors: HashMap<String, MonitorHandle>,
}

impl DeviceRegistry {
    pub fn new(handles: Vec<MonitorHandle>) -> Self {
        let monitors = handles
            .into_iter()
            .map(|h| (h.config.device_id.clone(), h))
            .collect();
        Self { monitors }
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// All monitor handles (for chat-scoped fanout)
    pub fn handles(&self) -> impl Iterator<Item = &MonitorHandle> {
        self.monitors.values()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.monitors.contains_key(device_id)
    }

    fn handle(&self, device_id: &str) -> Result<&MonitorHandle> {
        self.monitors
            .get(device_id)
            .ok_or_else(|| Error::NotFound(format!("unknown device: {}", device_id)))
    }

    /// Forward a raw reading to the device's monitor
    pub async fn on_raw_reading(&self, device_id: &str, level: RawLevel) -> Result<()> {
        let handle = self.handle(device_id)?;
        handle.send(MonitorEvent::Reading(level)).await;
        Ok(())
    }

    /// Forward a connectivity change to the device's monitor
    pub async fn on_connectivity_change(&self, device_id: &str, connected: bool) -> Result<()> {
        let handle = self.handle(device_id)?;
        handle.send(MonitorEvent::Connectivity(connected)).await;
        Ok(())
    }

    /// Current state + display text of a device
    pub async fn query_status(&self, device_id: &str) -> Result<DeviceStatus> {
        let handle = self.handle(device_id)?;
        let status = handle.status().await;
        Ok(DeviceStatus {
            device_id: device_id.to_string(),
            state: status.state,
            text: format!(
                "{}: {}",
                handle.config.label,
                state_label(&handle.config, status.state)
            ),
            last_transition_at: status.last_transition_at,
        })
    }

    /// Resolve which device a chat is scoped to (for inbound status queries)
    pub fn resolve_device_for_channel(&self, chat_id: i64) -> Result<String> {
        self.monitors
            .values()
            .find(|h| h.config.chat_id == chat_id)
            .map(|h| h.config.device_id.clone())
            .ok_or_else(|| Error::NotFound(format!("no device for chat {}", chat_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_config::DeviceConfig;
    use crate::device_monitor;
    use crate::signal_source::PushSignalSource;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn config(device_id: &str, label: &str, chat_id: i64) -> Arc<DeviceConfig> {
        Arc::new(DeviceConfig {
            device_id: device_id.to_string(),
            label: label.to_string(),
            chat_id,
            escalation_chat_id: -100300,
            debounce_ms: 2000,
            notify_on_high: true,
            notify_on_low: true,
            label_high: "opening".to_string(),
            label_low: "closing".to_string(),
            snapshots: vec![],
        })
    }

    fn registry() -> (DeviceRegistry, Arc<PushSignalSource>) {
        let source = Arc::new(PushSignalSource::new());
        let (tx, _rx) = mpsc::channel(8);
        let handles = vec![
            device_monitor::spawn(config("gate-1", "Gate", -100200), source.clone(), tx.clone()),
            device_monitor::spawn(config("door-2", "Door", -100201), source.clone(), tx),
        ];
        (DeviceRegistry::new(handles), source)
    }

    #[tokio::test]
    async fn test_unknown_device_yields_not_found() {
        let (registry, _) = registry();
        assert!(matches!(
            registry.on_raw_reading("nope", RawLevel::High).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.on_connectivity_change("nope", true).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.query_status("nope").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_status_of_fresh_device() {
        let (registry, _) = registry();
        let status = registry.query_status("gate-1").await.unwrap();
        assert_eq!(status.state, DeviceState::Uninitialized);
        assert_eq!(status.text, "Gate: initializing");
        assert!(status.last_transition_at.is_none());
    }

    #[tokio::test]
    async fn test_resolve_device_for_channel() {
        let (registry, _) = registry();
        assert_eq!(
            registry.resolve_device_for_channel(-100201).unwrap(),
            "door-2"
        );
        assert!(registry.resolve_device_for_channel(-1).is_err());
    }
}
