//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parlor_core::error::GameError;
use serde::Serialize;

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `GameError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            GameError::Unauthorized(_) => (StatusCode::FORBIDDEN, "unauthorized"),
            GameError::InvalidPhase { .. } => (StatusCode::CONFLICT, "invalid_phase"),
            GameError::ResourceExhausted(_) => (StatusCode::CONFLICT, "resource_exhausted"),
            GameError::ConfigDisabled(_) => (StatusCode::CONFLICT, "config_disabled"),
            GameError::SessionEnded => (StatusCode::GONE, "session_ended"),
            GameError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GameError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            GameError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
