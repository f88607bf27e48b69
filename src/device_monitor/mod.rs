//! DeviceMonitor - Per-Device Debounced State Machine
//!
//! ## Responsibilities
//!
//! - Coalesce bursts of raw readings into one committed transition
//! - Cancel-and-replace debounce timer (at most one live per device)
//! - Immediate Error transition on lost connectivity, reset on restore
//!
//! Each monitor is an independent actor: its state and timer are mutated
//! only by its own sequential event stream. Readings for different devices
//! proceed fully in parallel.

use crate::device_config::DeviceConfig;
use crate::signal_source::{RawLevel, SignalSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;

/// Committed device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Pre-first-reading state (start or after reconnect)
    Uninitialized,
    /// Hardware link lost
    Error,
    /// Sensor settled on 0
    Low,
    /// Sensor settled on 1
    High,
}

impl From<RawLevel> for DeviceState {
    fn from(level: RawLevel) -> Self {
        match level {
            RawLevel::Low => DeviceState::Low,
            RawLevel::High => DeviceState::High,
        }
    }
}

/// A committed, stable change from one state to another
///
/// Produced once per committed change; never retroactively altered.
#[derive(Debug, Clone)]
pub struct Transition {
    pub device_id: String,
    pub previous: DeviceState,
    pub new: DeviceState,
    pub at: DateTime<Utc>,
}

impl Transition {
    /// First committed observation after start or reconnect
    pub fn is_initial(&self) -> bool {
        self.previous == DeviceState::Uninitialized
    }
}

/// Events delivered to a monitor's mailbox
#[derive(Debug, Clone, Copy)]
pub enum MonitorEvent {
    /// Raw reading arrived; restarts the debounce window
    Reading(RawLevel),
    /// Hardware link went up/down
    Connectivity(bool),
}

/// Snapshot of a monitor's committed state
#[derive(Debug, Clone, Copy)]
pub struct MonitorStatus {
    pub state: DeviceState,
    pub last_transition_at: Option<DateTime<Utc>>,
}

/// Handle to a running monitor task
#[derive(Clone)]
pub struct MonitorHandle {
    pub config: Arc<DeviceConfig>,
    events: mpsc::Sender<MonitorEvent>,
    status: Arc<RwLock<MonitorStatus>>,
}

impl MonitorHandle {
    /// Deliver an event to the monitor's mailbox
    pub async fn send(&self, event: MonitorEvent) {
        if self.events.send(event).await.is_err() {
            tracing::warn!(
                device = %self.config.label,
                "monitor task gone, event dropped"
            );
        }
    }

    /// Current committed state
    pub async fn status(&self) -> MonitorStatus {
        *self.status.read().await
    }
}

/// Spawn a monitor task for one device
///
/// Committed transitions are emitted on `transitions`; the consumer decides
/// routing and notification. The monitor never blocks on I/O beyond the
/// `read_current` call at timer expiry.
pub fn spawn(
    config: Arc<DeviceConfig>,
    source: Arc<dyn SignalSource>,
    transitions: mpsc::Sender<Transition>,
) -> MonitorHandle {
    let (tx, rx) = mpsc::channel(32);
    let status = Arc::new(RwLock::new(MonitorStatus {
        state: DeviceState::Uninitialized,
        last_transition_at: None,
    }));

    let monitor = DeviceMonitor {
        config: config.clone(),
        source,
        state: DeviceState::Uninitialized,
        status: status.clone(),
        transitions,
    };

    tokio::spawn(monitor.run(rx));

    MonitorHandle {
        config,
        events: tx,
        status,
    }
}

/// Per-device state machine, owned exclusively by its task
struct DeviceMonitor {
    config: Arc<DeviceConfig>,
    source: Arc<dyn SignalSource>,
    state: DeviceState,
    status: Arc<RwLock<MonitorStatus>>,
    transitions: mpsc::Sender<Transition>,
}

impl DeviceMonitor {
    async fn run(mut self, mut events: mpsc::Receiver<MonitorEvent>) {
        // At most one live debounce deadline; replacing it is the
        // cancel-and-replace discipline.
        let mut deadline: Option<Instant> = None;

        loop {
            // Value never polled unless a deadline is armed.
            let wake_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(MonitorEvent::Reading(level)) => {
                            deadline = Some(
                                Instant::now() + Duration::from_millis(self.config.debounce_ms),
                            );
                            tracing::debug!(
                                device = %self.config.label,
                                raw = level.as_u8(),
                                window_ms = self.config.debounce_ms,
                                "debounce window restarted"
                            );
                        }
                        Some(MonitorEvent::Connectivity(false)) => {
                            deadline = None;
                            if self.state != DeviceState::Error {
                                tracing::warn!(
                                    device = %self.config.label,
                                    "hardware link lost"
                                );
                                self.commit(DeviceState::Error).await;
                            }
                        }
                        Some(MonitorEvent::Connectivity(true)) => {
                            // Reset and re-arm from scratch; next committed
                            // change routes as an initial observation.
                            deadline = None;
                            self.set_state(DeviceState::Uninitialized).await;
                            tracing::info!(
                                device = %self.config.label,
                                "hardware link restored, awaiting readings"
                            );
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    deadline = None;
                    self.on_timer_expiry().await;
                }
            }
        }

        tracing::debug!(device = %self.config.label, "monitor stopped");
    }

    /// Timer expired: read the *current* raw value and compare with the
    /// stored state. Equal means the burst settled back to what we already
    /// committed; the edge is rejected as noise.
    async fn on_timer_expiry(&mut self) {
        let level = match self.source.read_current(&self.config.device_id).await {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!(
                    device = %self.config.label,
                    error = %e,
                    "raw read failed at debounce expiry"
                );
                return;
            }
        };

        let settled = DeviceState::from(level);
        if settled == self.state {
            tracing::debug!(
                device = %self.config.label,
                raw = level.as_u8(),
                "ignored: value unchanged at debounce expiry"
            );
            return;
        }

        self.commit(settled).await;
    }

    async fn commit(&mut self, new: DeviceState) {
        let transition = Transition {
            device_id: self.config.device_id.clone(),
            previous: self.state,
            new,
            at: Utc::now(),
        };

        tracing::info!(
            device = %self.config.label,
            previous = ?transition.previous,
            new = ?transition.new,
            "transition committed"
        );

        self.state = new;
        {
            let mut status = self.status.write().await;
            status.state = new;
            status.last_transition_at = Some(transition.at);
        }

        if self.transitions.send(transition).await.is_err() {
            tracing::warn!(
                device = %self.config.label,
                "transition consumer gone"
            );
        }
    }

    async fn set_state(&mut self, state: DeviceState) {
        self.state = state;
        self.status.write().await.state = state;
    }
}
