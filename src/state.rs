//! Application state
//!
//! Holds configuration and the shared components handlers need.

use crate::device_registry::DeviceRegistry;
use crate::notifier::NotificationDispatcher;
use crate::signal_source::PushSignalSource;
use std::path::PathBuf;
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Telegram bot token
    pub telegram_token: String,
    /// Escalation chat (initial observations, errors, /getId answers)
    pub dev_chat_id: i64,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Path to the device descriptors JSON file
    pub devices_file: PathBuf,
    /// Camera directory service base URL
    pub camera_base_url: String,
    /// Camera directory guest login id
    pub camera_login_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram_token: std::env::var("TELEGRAM_TOKEN").unwrap_or_default(),
            dev_chat_id: std::env::var("DEV_CHAT_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            devices_file: std::env::var("DEVICES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("devices.json")),
            camera_base_url: std::env::var("CAMERA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            camera_login_id: std::env::var("CAMERA_LOGIN_ID")
                .unwrap_or_else(|_| "guest".to_string()),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// All device monitors
    pub registry: Arc<DeviceRegistry>,
    /// Latest pushed values for push-style devices
    pub push_source: Arc<PushSignalSource>,
    /// Messaging dispatcher
    pub dispatcher: Arc<NotificationDispatcher>,
}
