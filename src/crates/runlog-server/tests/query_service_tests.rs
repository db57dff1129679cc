//! Integration tests for the query service

mod common;

use common::{create_corrupt_run, create_exp1, query_service, setup_home};
use runlog::{Run, RunOutcome, RunStatus, RunStore, StepRange, TypedValue};
use runlog_server::QueryService;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_list_runs_reads_meta() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;

    let run = Run::builder(settings.clone())
        .project("vision")
        .run_name("resnet")
        .experiment_name("baseline")
        .start()
        .await
        .unwrap();
    run.log_metrics([("acc", 0.7)], 0).await.unwrap();
    run.close(RunOutcome::Failed).await.unwrap();

    let runs = query_service(&settings).list_runs().await.unwrap();
    assert_eq!(runs.len(), 2);

    // Newest first
    assert_eq!(runs[0].project, "vision");
    assert_eq!(runs[0].run_name, "resnet");
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].experiment_name.as_deref(), Some("baseline"));
    assert!(runs[0].closed_at.is_some());

    assert_eq!(runs[1].run_name, "exp1");
    assert_eq!(runs[1].status, RunStatus::Finished);
    assert_eq!(runs[1].experiment_name, None);
}

#[tokio::test]
async fn test_list_runs_isolates_corrupt_file() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    create_corrupt_run(&settings, "default", "broken");

    let runs = query_service(&settings).list_runs().await.unwrap();
    assert_eq!(runs.len(), 2);

    let good = runs.iter().find(|r| r.run_name == "exp1").unwrap();
    assert_eq!(good.status, RunStatus::Finished);
    assert!(good.created_at.is_some());

    let bad = runs.iter().find(|r| r.run_name == "broken").unwrap();
    assert_eq!(bad.status, RunStatus::Unknown);
    assert_eq!(bad.created_at, None);
}

#[tokio::test]
async fn test_list_runs_ignores_other_files() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;

    let runs_dir = settings.run_path("default", "x").parent().unwrap().to_path_buf();
    std::fs::write(runs_dir.join("notes.txt"), b"not a run").unwrap();
    std::fs::create_dir_all(settings.projects_dir().join(".cache")).unwrap();

    let runs = query_service(&settings).list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn test_list_runs_skips_project_without_runs_dir() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;

    // `runs` is a plain file in one project and missing in another
    let odd = settings.projects_dir().join("zzz");
    std::fs::create_dir_all(&odd).unwrap();
    std::fs::write(odd.join("runs"), b"not a directory").unwrap();
    std::fs::create_dir_all(settings.projects_dir().join("empty")).unwrap();

    let runs = query_service(&settings).list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].project, "default");
    assert_eq!(runs[0].run_name, "exp1");
    assert_eq!(runs[0].status, RunStatus::Finished);
}

#[tokio::test]
async fn test_get_configs_and_paths() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let service = query_service(&settings);

    let configs = service.get_configs("default", "exp1").await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs["lr"], TypedValue::Float(0.001));

    let paths = service.get_metric_paths("default", "exp1").await.unwrap();
    assert_eq!(paths, vec!["loss".to_string()]);
}

#[tokio::test]
async fn test_unknown_run_and_project() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let service = query_service(&settings);

    let err = service.get_configs("default", "ghost").await.unwrap_err();
    assert!(err.is_not_found());
    let err = service
        .get_metrics("elsewhere", "exp1", None, StepRange::all())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "RunNotFound");
}

#[tokio::test]
async fn test_get_metrics_filters() {
    let (_home, settings) = setup_home();
    create_exp1(&settings).await;
    let service = query_service(&settings);

    let all = service
        .get_metrics("default", "exp1", None, StepRange::all())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let last = service
        .get_metrics("default", "exp1", Some("loss"), StepRange::new(Some(1), None))
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].step, 1);
    assert_eq!(last[0].value, 0.5);

    let none = service
        .get_metrics("default", "exp1", Some("acc"), StepRange::all())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_metrics_during_writes() {
    let (_home, settings) = setup_home();
    let store = Arc::new(RunStore::open(settings.run_path("default", "live")).await.unwrap());
    let service = QueryService::new(settings.projects_dir());
    let committed = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let committed = committed.clone();
        let done = done.clone();
        tokio::spawn(async move {
            for i in 0..1000usize {
                let series = ["a", "b", "c"][i % 3];
                store.log_metric(series, i / 3, i as f64).await.unwrap();
                committed.fetch_add(1, Ordering::SeqCst);
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let mut reads = 0;
    while !done.load(Ordering::SeqCst) || reads == 0 {
        let points = service
            .get_metrics("default", "live", None, StepRange::all())
            .await
            .unwrap();
        let after = committed.load(Ordering::SeqCst);
        assert!(points.len() <= after);
        assert!(points.iter().all(|p| p.value.is_finite()));
        reads += 1;
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();

    let points = service
        .get_metrics("default", "live", None, StepRange::all())
        .await
        .unwrap();
    assert_eq!(points.len(), 1000);
    store.finalize(RunOutcome::Finished).await.unwrap();
}
