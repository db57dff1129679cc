//! Common test utilities and setup

#![allow(dead_code)]

use runlog::{Run, RunOutcome, Settings};
use runlog_server::QueryService;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A temporary home directory and the settings rooted at it
pub fn setup_home() -> (TempDir, Settings) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let settings = Settings::with_home(temp_dir.path());
    (temp_dir, settings)
}

/// Write the run "exp1" in project "default": one config, two loss points,
/// finalized as finished
pub async fn create_exp1(settings: &Settings) -> PathBuf {
    let run = Run::builder(settings.clone())
        .run_name("exp1")
        .start()
        .await
        .expect("Failed to start run");

    run.log_configs([("lr", 0.001)]).await.expect("Failed to log configs");
    run.log_metrics([("loss", 0.9)], 0).await.expect("Failed to log step 0");
    run.log_metrics([("loss", 0.5)], 1).await.expect("Failed to log step 1");
    run.close(RunOutcome::Finished).await.expect("Failed to close run");

    run.path().to_path_buf()
}

/// Drop a file that is not a SQLite database into a project's runs dir
pub fn create_corrupt_run(settings: &Settings, project: &str, run_name: &str) -> PathBuf {
    let path = settings.run_path(project, run_name);
    std::fs::create_dir_all(path.parent().expect("run path has a parent"))
        .expect("Failed to create runs dir");
    std::fs::write(&path, b"SQLite format 2\0 truncated garbage that is no database")
        .expect("Failed to write corrupt run");
    path
}

pub fn query_service(settings: &Settings) -> Arc<QueryService> {
    Arc::new(QueryService::new(settings.projects_dir()))
}
