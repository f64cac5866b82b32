//! Centralized error type for Ferry's HTTP surface.
//!
//! Library crates keep their own `thiserror` enums and convert into
//! [`FerryError`] at the edge, where it maps onto a status code and a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum FerryError {
    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    // === Validation errors ===
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Remote peers ===
    #[error("Delivery failed: {message}")]
    DeliveryFailed { message: String },

    // === Infrastructure errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body sent to clients.
#[derive(Serialize)]
struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

impl FerryError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::DeliveryFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code string for programmatic handling by clients.
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for FerryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't leak internal details to clients
        let message = match &self {
            FerryError::Database(e) => {
                tracing::error!("Database error: {e}");
                "An internal error occurred".to_string()
            }
            FerryError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                "An internal error occurred".to_string()
            }
            FerryError::DeliveryFailed { message } => {
                tracing::warn!("Delivery failed: {message}");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: status.as_u16(),
            error: self.error_code().to_string(),
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results using FerryError.
pub type FerryResult<T> = Result<T, FerryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(FerryError::not_found("Actor").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(FerryError::validation("bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            FerryError::DeliveryFailed { message: "down".into() }.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            FerryError::Database("pool closed".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn internal_details_are_not_rendered() {
        let response = FerryError::Database("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "DATABASE_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("hunter2"));
    }
}
