//! Error handling for doorwatch

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not found (unknown device id / chat id)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Camera service login failed
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Camera list retrieval failed
    #[error("Directory error: {0}")]
    Directory(String),

    /// Configured camera id not present in the directory
    #[error("Camera not found: {0}")]
    CameraNotFound(String),

    /// Snapshot link resolution failed
    #[error("Link resolution error: {0}")]
    LinkResolution(String),

    /// Image fetch failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Messaging send failed (logged, never retried)
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::Authentication(msg) => (
                StatusCode::BAD_GATEWAY,
                "AUTHENTICATION_ERROR",
                msg.clone(),
            ),
            Error::Directory(msg) => (StatusCode::BAD_GATEWAY, "DIRECTORY_ERROR", msg.clone()),
            Error::CameraNotFound(msg) => (StatusCode::NOT_FOUND, "CAMERA_NOT_FOUND", msg.clone()),
            Error::LinkResolution(msg) => (
                StatusCode::BAD_GATEWAY,
                "LINK_RESOLUTION_ERROR",
                msg.clone(),
            ),
            Error::Fetch(msg) => (StatusCode::BAD_GATEWAY, "FETCH_ERROR", msg.clone()),
            Error::Dispatch(msg) => (StatusCode::BAD_GATEWAY, "DISPATCH_ERROR", msg.clone()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
