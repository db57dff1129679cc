//! HTTP API over the query service
//!
//! Provides read-only JSON endpoints for:
//! - Run listing
//! - Configs, metric paths and metric points of one run
//! - Health checks

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use middleware::{cors_layer, logging_layer};
pub use routes::{create_router, AppState};
