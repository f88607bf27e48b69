//! WebAPI - Push Ingress Endpoints
//!
//! ## Responsibilities
//!
//! - `POST /updateStatus`: raw value push from devices without a
//!   persistent link
//! - `GET /healthz`: liveness probe
//! - `GET /status/:device_id`: current state of a device

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::{Error, Result};
use crate::models::{HealthResponse, StatusResponse, UpdateStatusRequest};
use crate::signal_source::RawLevel;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/updateStatus", post(update_status))
        .route("/status/:device_id", get(device_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices: state.registry.len(),
    })
}

/// Accept a pushed raw reading
///
/// A recognized device always answers success, even when the value is
/// unchanged and no transition will be committed.
async fn update_status(
    State(state): State<AppState>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse> {
    let level = RawLevel::from_u8(request.raw_value).ok_or_else(|| {
        Error::Validation(format!("rawValue must be 0 or 1, got {}", request.raw_value))
    })?;

    tracing::info!(
        device_id = %request.device_id,
        raw = level.as_u8(),
        "push reading received"
    );

    // Unrecognized ids must leave no trace in the value store.
    if !state.registry.contains(&request.device_id) {
        return Err(Error::NotFound(format!(
            "unknown device: {}",
            request.device_id
        )));
    }

    // Store before forwarding so the monitor reads this value at debounce
    // expiry.
    state.push_source.update(&request.device_id, level).await;
    state.registry.on_raw_reading(&request.device_id, level).await?;

    Ok(Json(json!({"message": "Succeed"})))
}

async fn device_status(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<impl IntoResponse> {
    let status = state.registry.query_status(&device_id).await?;
    Ok(Json(StatusResponse {
        device_id: status.device_id,
        state: status.state,
        text: status.text,
        last_transition_at: status.last_transition_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_config::DeviceConfig;
    use crate::device_monitor;
    use crate::device_registry::DeviceRegistry;
    use crate::notifier::testing::RecordingMessenger;
    use crate::notifier::NotificationDispatcher;
    use crate::signal_source::{PushSignalSource, SignalSource};
    use crate::state::AppConfig;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn test_state() -> AppState {
        let source = Arc::new(PushSignalSource::new());
        let (tx, _rx) = mpsc::channel(8);
        let config = Arc::new(DeviceConfig {
            device_id: "gate-1".to_string(),
            label: "Gate".to_string(),
            chat_id: -100200,
            escalation_chat_id: -100300,
            debounce_ms: 2000,
            notify_on_high: true,
            notify_on_low: true,
            label_high: "opening".to_string(),
            label_low: "closing".to_string(),
            snapshots: vec![],
        });
        let handle = device_monitor::spawn(config, source.clone(), tx);

        AppState {
            config: AppConfig {
                telegram_token: String::new(),
                dev_chat_id: -100300,
                host: "127.0.0.1".to_string(),
                port: 0,
                devices_file: "devices.json".into(),
                camera_base_url: "http://localhost:8000".to_string(),
                camera_login_id: "guest".to_string(),
            },
            registry: Arc::new(DeviceRegistry::new(vec![handle])),
            push_source: source,
            dispatcher: Arc::new(NotificationDispatcher::new(Arc::new(
                RecordingMessenger::new(),
            ))),
        }
    }

    #[tokio::test]
    async fn test_recognized_push_succeeds_even_without_transition() {
        let state = test_state();
        let request = UpdateStatusRequest {
            device_id: "gate-1".to_string(),
            raw_value: 1,
        };
        assert!(update_status(State(state.clone()), Json(request)).await.is_ok());

        // Same value again: still success
        let request = UpdateStatusRequest {
            device_id: "gate-1".to_string(),
            raw_value: 1,
        };
        assert!(update_status(State(state), Json(request)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let state = test_state();
        let request = UpdateStatusRequest {
            device_id: "nope".to_string(),
            raw_value: 0,
        };
        let err = update_status(State(state), Json(request)).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejected_push_leaves_no_stored_value() {
        let state = test_state();
        let request = UpdateStatusRequest {
            device_id: "never-configured".to_string(),
            raw_value: 1,
        };
        let err = update_status(State(state.clone()), Json(request)).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(_)));

        // The rejected device's value must not persist in the source
        assert!(state.push_source.read_current("never-configured").await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_value_rejected() {
        let state = test_state();
        let request = UpdateStatusRequest {
            device_id: "gate-1".to_string(),
            raw_value: 3,
        };
        let err = update_status(State(state), Json(request)).await.err().unwrap();
        assert!(matches!(err, Error::Validation(_)));
    }
}
