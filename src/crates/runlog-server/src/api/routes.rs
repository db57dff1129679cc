//! API route definitions

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::api::{handlers, middleware};
use crate::services::QueryService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<QueryService>,
}

/// Build the complete API router.
///
/// CORS and request tracing wrap every route and the fallback.
pub fn create_router(query: Arc<QueryService>) -> Router {
    let app_state = AppState { query };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/runs", get(handlers::list_runs))
        .route("/api/runs/:project/:run/configs", get(handlers::get_configs))
        .route("/api/runs/:project/:run/metrics", get(handlers::get_metrics))
        .route(
            "/api/runs/:project/:run/metric-paths",
            get(handlers::get_metric_paths),
        )
        .fallback(handlers::not_found)
        .with_state(app_state)
        .layer(middleware::logging_layer())
        .layer(middleware::cors_layer())
}
