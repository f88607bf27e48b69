//! doorwatch
//!
//! Door/lock contact monitor: debounces raw sensor readings relayed through
//! hardware bridges, notifies operators over Telegram, and threads camera
//! snapshots under each alert.
//!
//! ## Components
//!
//! 1. DeviceMonitor - per-device debounced state machine
//! 2. DeviceRegistry - monitor ownership and lookup
//! 3. ChannelRouter - notification target decision
//! 4. NotificationDispatcher - best-effort messaging delivery
//! 5. SnapshotPipeline - chained snapshot retrieval per source/delay
//! 6. CameraDirectory - external camera system adapter
//! 7. Telegram - Bot API adapter + inbound commands
//! 8. WebAPI - push ingress for HTTP sensors
//!
//! ## Design Principles
//!
//! - One actor per device; no shared mutable state between devices
//! - Fire-and-forget notifications; failures logged, never retried
//! - Pipeline runs independent per source/delay; failures never propagate

pub mod alert_orchestrator;
pub mod camera_client;
pub mod channel_router;
pub mod device_config;
pub mod device_monitor;
pub mod device_registry;
pub mod error;
pub mod models;
pub mod notifier;
pub mod signal_source;
pub mod snapshot_pipeline;
pub mod state;
pub mod telegram;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
