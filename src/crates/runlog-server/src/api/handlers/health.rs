//! Health check and fallback handlers

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api::models::HealthResponse;

/// Handler for GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Unknown routes answer 404 with an empty object
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({})))
}
