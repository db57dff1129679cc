//! Common test utilities and setup

#![allow(dead_code)]

use runlog::RunStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

static TEST_RUN_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Path for a fresh run file inside `dir`
pub fn unique_run_path(dir: &TempDir) -> PathBuf {
    let counter = TEST_RUN_COUNTER.fetch_add(1, Ordering::SeqCst);
    dir.path().join(format!("run_{}.sqlite", counter))
}

/// Create a writer on a fresh run file
pub async fn setup_test_store() -> (TempDir, RunStore) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = unique_run_path(&temp_dir);

    let store = RunStore::open(&path)
        .await
        .expect("Failed to create test store");

    (temp_dir, store)
}
