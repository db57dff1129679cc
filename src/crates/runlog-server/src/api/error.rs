//! API error types and HTTP response conversion
//!
//! Store errors keep their kind on the wire; the status code depends on
//! the kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use runlog::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Error kind identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Custom API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure reported by the run store
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Malformed request parameters
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Store(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Store(e) if e.is_busy() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type name
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Store(e) => e.kind(),
            ApiError::BadRequest(_) => "BadRequest",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ApiErrorResponse::new(self.error_type(), self.to_string());

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %body.error, message = %body.message, "API error");
        } else {
            tracing::debug!(status = status.as_u16(), error = %body.error, "API error");
        }

        (status, Json(body)).into_response()
    }
}
