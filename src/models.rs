//! Wire-facing request/response models

use crate::device_monitor::DeviceState;
use serde::{Deserialize, Serialize};

/// Push ingress payload from devices without a persistent link
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub device_id: String,
    /// Raw binary sensor value (0/1)
    pub raw_value: u8,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub devices: usize,
}

/// Status query response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub device_id: String,
    pub state: DeviceState,
    pub text: String,
    pub last_transition_at: Option<chrono::DateTime<chrono::Utc>>,
}
