//! A reader polling a run while the writer appends to it

mod common;

use common::setup_test_store;
use runlog::{RunOutcome, RunRead, RunReader, RunStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SERIES: [&str; 3] = ["train/loss", "train/acc", "val/loss"];
const TOTAL_POINTS: usize = 1000;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_sees_committed_prefix_while_writing() {
    let (_dir, store) = setup_test_store().await;
    let path = store.path().to_path_buf();
    let store = Arc::new(store);
    let committed = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let committed = committed.clone();
        let done = done.clone();
        tokio::spawn(async move {
            for i in 0..TOTAL_POINTS {
                let series = SERIES[i % SERIES.len()];
                let step = (i / SERIES.len()) as i64;
                store.log_metric(series, step, i as f64).await.unwrap();
                committed.fetch_add(1, Ordering::SeqCst);
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = {
        let committed = committed.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut reads = 0usize;
            while !done.load(Ordering::SeqCst) || reads == 0 {
                let before = committed.load(Ordering::SeqCst);
                let handle = RunReader::open(&path).await.unwrap();
                let points = handle.read_all_metric_points(None).await.unwrap();
                handle.close().await;
                let after = committed.load(Ordering::SeqCst);

                assert!(points.len() >= before, "read {} points, {} were committed", points.len(), before);
                assert!(points.len() <= after, "read {} points, only {} committed", points.len(), after);

                for pair in points.windows(2) {
                    let ordered = (pair[0].path.as_str(), pair[0].step) < (pair[1].path.as_str(), pair[1].step);
                    assert!(ordered, "points out of order: {:?}", pair);
                }
                for point in &points {
                    assert!(SERIES.contains(&point.path.as_str()));
                    assert!(point.value.is_finite());
                    assert!(point.ts > 0);
                }

                reads += 1;
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            reads
        })
    };

    writer.await.unwrap();
    let reads = reader.await.unwrap();
    assert!(reads > 0);

    assert_eq!(store.read_all_metric_points(None).await.unwrap().len(), TOTAL_POINTS);
    store.finalize(RunOutcome::Finished).await.unwrap();
    assert!(store.is_closed());

    let handle = RunReader::open(store.path()).await.unwrap();
    assert_eq!(handle.read_status().await.unwrap(), RunStatus::Finished);
    for series in SERIES {
        let points = handle.read_metric_points(series, None).await.unwrap();
        let steps: Vec<i64> = points.iter().map(|p| p.step).collect();
        let expected: Vec<i64> = (0..steps.len() as i64).collect();
        assert_eq!(steps, expected);
    }
    handle.close().await;
}
