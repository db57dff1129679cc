//! Run endpoint handlers

use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::Uri,
    Json,
};
use runlog::{StoreError, TypedValue};
use std::collections::BTreeMap;

use crate::api::{
    error::{ApiError, ApiResult},
    models::MetricsQuery,
    routes::AppState,
};
use crate::services::{MetricPointRecord, RunSummary};

/// List every run
///
/// GET /api/runs
pub async fn list_runs(State(app_state): State<AppState>) -> ApiResult<Json<Vec<RunSummary>>> {
    let runs = app_state.query.list_runs().await?;
    Ok(Json(runs))
}

/// Configs of one run
///
/// GET /api/runs/:project/:run/configs
pub async fn get_configs(
    State(app_state): State<AppState>,
    uri: Uri,
    ids: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<BTreeMap<String, TypedValue>>> {
    let (project, run) = run_ids(ids, &uri)?;
    let configs = app_state.query.get_configs(&project, &run).await?;
    Ok(Json(configs))
}

/// Metric points of one run, optionally one series and a step range
///
/// GET /api/runs/:project/:run/metrics?path=&min_step=&max_step=
pub async fn get_metrics(
    State(app_state): State<AppState>,
    uri: Uri,
    ids: Result<Path<(String, String)>, PathRejection>,
    query: Result<Query<MetricsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MetricPointRecord>>> {
    let (project, run) = run_ids(ids, &uri)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let points = app_state
        .query
        .get_metrics(&project, &run, query.series(), query.step_range())
        .await?;
    Ok(Json(points))
}

/// Series paths of one run
///
/// GET /api/runs/:project/:run/metric-paths
pub async fn get_metric_paths(
    State(app_state): State<AppState>,
    uri: Uri,
    ids: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Json<Vec<String>>> {
    let (project, run) = run_ids(ids, &uri)?;
    let paths = app_state.query.get_metric_paths(&project, &run).await?;
    Ok(Json(paths))
}

/// Project and run from the path. Segments that do not decode to UTF-8
/// name no run, so they are a `RunNotFound` like any other unknown run.
fn run_ids(ids: Result<Path<(String, String)>, PathRejection>, uri: &Uri) -> ApiResult<(String, String)> {
    match ids {
        Ok(Path(ids)) => Ok(ids),
        Err(rejection) => {
            tracing::debug!(uri = %uri, reason = %rejection.body_text(), "Undecodable run identifiers");
            let mut segments = uri.path().trim_start_matches('/').split('/').skip(2);
            let project = segments.next().unwrap_or_default();
            let run = segments.next().unwrap_or_default();
            Err(ApiError::from(StoreError::run_not_found(project, run)))
        }
    }
}
