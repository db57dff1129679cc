//! Router tests driven through `tower::ServiceExt::oneshot`

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::{create_corrupt_run, create_exp1, query_service, setup_home};
use runlog::{RunStore, Settings};
use runlog_server::api::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder()
        .uri(uri)
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let cors = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, cors, body)
}

fn app_for(settings: &Settings) -> Router {
    create_router(query_service(settings))
}

#[tokio::test]
async fn test_end_to_end_exp1() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let app = app_for(&settings);

    let (status, cors, body) = get(&app, "/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cors.as_deref(), Some("*"));
    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["project"], "default");
    assert_eq!(runs[0]["run_name"], "exp1");
    assert_eq!(runs[0]["status"], "finished");
    assert!(runs[0]["created_at"].is_string());
    assert!(runs[0]["closed_at"].is_string());

    let (status, _, body) = get(&app, "/api/runs/default/exp1/metrics?path=loss").await;
    assert_eq!(status, StatusCode::OK);
    let points = body.as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["path"], "loss");
    assert_eq!(points[0]["step"], 0);
    assert_eq!(points[0]["value"], 0.9);
    assert_eq!(points[1]["step"], 1);
    assert_eq!(points[1]["value"], 0.5);
    let ts = points[0]["ts"].as_str().unwrap();
    assert!(ts.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());

    let (status, _, body) = get(&app, "/api/runs/default/exp1/configs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"lr": 0.001}));

    let (status, _, body) = get(&app, "/api/runs/default/exp1/metric-paths").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["loss"]));
}

#[tokio::test]
async fn test_metrics_step_range_and_all_series() {
    let (_home, settings) = setup_home();
    let store = RunStore::open(settings.run_path("default", "sweep")).await.unwrap();
    for step in 0..5 {
        store
            .log_metrics([("train/loss", 1.0), ("val/loss", 2.0)], step)
            .await
            .unwrap();
    }
    let app = app_for(&settings);

    let (status, _, body) = get(&app, "/api/runs/default/sweep/metrics?min_step=1&max_step=2").await;
    assert_eq!(status, StatusCode::OK);
    let keys: Vec<(String, i64)> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["path"].as_str().unwrap().to_string(), p["step"].as_i64().unwrap()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("train/loss".to_string(), 1),
            ("train/loss".to_string(), 2),
            ("val/loss".to_string(), 1),
            ("val/loss".to_string(), 2),
        ]
    );

    // The writer is still open; the reader sees a running run
    let (_, _, body) = get(&app, "/api/runs").await;
    assert_eq!(body[0]["status"], "running");

    store.finalize(runlog::RunOutcome::Finished).await.unwrap();
}

#[tokio::test]
async fn test_bad_step_is_bad_request() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let app = app_for(&settings);

    let (status, cors, body) = get(&app, "/api/runs/default/exp1/metrics?min_step=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cors.as_deref(), Some("*"));
    assert_eq!(body["error"], "BadRequest");
}

#[tokio::test]
async fn test_missing_run_is_not_found() {
    let (_home, settings) = setup_home();
    let app = app_for(&settings);

    for uri in [
        "/api/runs/default/ghost/configs",
        "/api/runs/default/ghost/metrics",
        "/api/runs/default/ghost/metric-paths",
        "/api/runs/..%2F..%2Fetc/passwd/configs",
    ] {
        let (status, cors, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(cors.as_deref(), Some("*"));
        assert_eq!(body["error"], "RunNotFound");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_undecodable_identifier_is_not_found() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let app = app_for(&settings);

    for uri in [
        "/api/runs/%FF/exp1/configs",
        "/api/runs/default/%C3%28/metrics",
        "/api/runs/%FE%FF/exp1/metric-paths",
    ] {
        let (status, cors, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(cors.as_deref(), Some("*"));
        assert_eq!(body["error"], "RunNotFound");
    }
}

#[tokio::test]
async fn test_unknown_route_is_empty_not_found() {
    let (_home, settings) = setup_home();
    let app = app_for(&settings);

    let (status, cors, body) = get(&app, "/api/nothing/here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(cors.as_deref(), Some("*"));
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn test_health() {
    let (_home, settings) = setup_home();
    let app = app_for(&settings);

    let (status, cors, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cors.as_deref(), Some("*"));
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_preflight_answered() {
    let (_home, settings) = setup_home();
    let app = app_for(&settings);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/runs")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_corrupt_run_listed_as_unknown() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    create_corrupt_run(&settings, "default", "broken");
    let app = app_for(&settings);

    let (status, _, body) = get(&app, "/api/runs").await;
    assert_eq!(status, StatusCode::OK);
    let runs = body.as_array().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0]["run_name"], "exp1");
    assert_eq!(runs[0]["status"], "finished");
    assert_eq!(runs[1]["run_name"], "broken");
    assert_eq!(runs[1]["status"], "unknown");

    // Reading the corrupt run fails for that request only
    let (status, _, body) = get(&app, "/api/runs/default/broken/configs").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (status, _, _) = get(&app, "/api/runs/default/exp1/configs").await;
    assert_eq!(status, StatusCode::OK);
}
