//! API Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use data_validator::ValidationError;
use serde_json::json;
use storage::StorageError;
use thiserror::Error;

/// Errors returned by request handlers, rendered as `{"error": "..."}`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (content type, JSON syntax)
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Storage(StorageError::NotConfigured) => {
                "Google Sheets not configured. Please check environment variables.".to_string()
            }
            ApiError::Storage(e) => format!("Failed to access sensor data: {}", e),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

/// Errors that stop the server from starting
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limit configuration error: {0}")]
    RateLimit(String),

    #[error("Metrics recorder error: {0}")]
    Metrics(String),

    #[error("Logging setup error: {0}")]
    Logging(String),

    #[error("Invalid bind address {addr}: {reason}")]
    BindAddr { addr: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ValidationError::MissingDistance).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::NotConfigured).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(StorageError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = ApiError::from(ValidationError::MissingDistance);
        assert_eq!(err.message(), "Distance is required and must be a number");
    }
}
