//! Batch processor windowing, fault isolation and progress tests

use crate::error::MigratorError;
use crate::migration::batch::{BatchFailure, BatchOptions, BatchProcessor};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn processor(batch_size: usize) -> BatchProcessor {
    BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(batch_size)
            .with_report_progress(false),
    )
}

#[tokio::test]
async fn test_windows_follow_input_order() {
    let items = ['a', 'b', 'c', 'd', 'e'];
    let mut windows = Vec::new();

    let report = processor(2)
        .process(&items, |batch, start, end| {
            windows.push((batch.to_vec(), start, end));
            let upper: Vec<char> = batch.iter().map(|c| c.to_ascii_uppercase()).collect();
            async move { Ok::<_, BatchFailure>(upper) }
        })
        .await
        .unwrap();

    assert_eq!(
        windows,
        vec![
            (vec!['a', 'b'], 0, 2),
            (vec!['c', 'd'], 2, 4),
            (vec!['e'], 4, 5),
        ]
    );
    assert_eq!(report.results, vec!['A', 'B', 'C', 'D', 'E']);
    assert_eq!(report.windows, 3);
    assert_eq!(report.failed_windows, 0);
    assert_eq!(report.processed, 5);
}

#[tokio::test]
async fn test_partition_covers_every_item_once() {
    for batch_size in 1..=7 {
        for len in 0..=20usize {
            let items: Vec<usize> = (0..len).collect();
            let mut seen = Vec::new();
            let mut window_sizes = Vec::new();

            let report = processor(batch_size)
                .process(&items, |batch, _, _| {
                    seen.extend_from_slice(batch);
                    window_sizes.push(batch.len());
                    async move { Ok::<Vec<()>, BatchFailure>(Vec::new()) }
                })
                .await
                .unwrap();

            assert_eq!(seen, items, "batch_size={batch_size} len={len}");
            assert_eq!(report.windows, len.div_ceil(batch_size));
            assert!(window_sizes.iter().all(|&n| n > 0 && n <= batch_size));
        }
    }
}

#[tokio::test]
async fn test_failed_window_is_dropped_and_processing_continues() {
    let items = [1, 2, 3, 4, 5, 6];

    let report = processor(2)
        .process(&items, |batch, start, _| {
            let owned = batch.to_vec();
            async move {
                if start == 2 {
                    return Err(MigratorError::database("bulk upsert", "timeout").into());
                }
                Ok::<_, BatchFailure>(owned)
            }
        })
        .await
        .unwrap();

    assert_eq!(report.results, vec![1, 2, 5, 6]);
    assert_eq!(report.windows, 3);
    assert_eq!(report.failed_windows, 1);
    assert_eq!(report.processed, 6);
}

#[tokio::test]
async fn test_every_window_failing_yields_empty_result() {
    let items = [1, 2, 3, 4, 5];
    let mut calls = 0;

    let report = processor(2)
        .process(&items, |_, _, _| {
            calls += 1;
            async move {
                Err::<Vec<i32>, _>(BatchFailure::Skip(MigratorError::database(
                    "bulk upsert",
                    "rejected",
                )))
            }
        })
        .await
        .unwrap();

    assert_eq!(calls, 3);
    assert!(report.results.is_empty());
    assert_eq!(report.failed_windows, 3);
}

#[tokio::test]
async fn test_abort_stops_processing() {
    let items = [1, 2, 3, 4, 5];
    let mut calls = 0;

    let result = processor(2)
        .process(&items, |batch, start, _| {
            calls += 1;
            let owned = batch.to_vec();
            async move {
                if start == 2 {
                    return Err(BatchFailure::Abort(MigratorError::NotConnected));
                }
                Ok(owned)
            }
        })
        .await;

    assert!(matches!(result, Err(MigratorError::NotConnected)));
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn test_empty_input_processes_no_windows() {
    let items: [u8; 0] = [];
    let mut calls = 0;

    let report = processor(3)
        .process(&items, |_, _, _| {
            calls += 1;
            async move { Ok::<Vec<u8>, BatchFailure>(Vec::new()) }
        })
        .await
        .unwrap();

    assert_eq!(calls, 0);
    assert_eq!(report.windows, 0);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn test_zero_batch_size_is_rejected() {
    let items = [1, 2];
    let result = processor(0)
        .process(&items, |batch, _, _| {
            let owned = batch.to_vec();
            async move { Ok::<_, BatchFailure>(owned) }
        })
        .await;

    assert!(matches!(result, Err(MigratorError::Configuration { .. })));
}

#[tokio::test]
async fn test_progress_observer_sees_cumulative_counts() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(2)
            .with_progress_interval(Duration::ZERO),
    )
    .with_observer(move |processed, total| sink.lock().unwrap().push((processed, total)));

    let items = ['a', 'b', 'c', 'd', 'e'];
    processor
        .process(&items, |batch, _, _| {
            let owned = batch.to_vec();
            async move { Ok::<_, BatchFailure>(owned) }
        })
        .await
        .unwrap();

    assert_eq!(*reported.lock().unwrap(), vec![(2, 5), (4, 5), (5, 5)]);
}

#[tokio::test]
async fn test_no_progress_inside_interval() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(1)
            .with_progress_interval(Duration::from_secs(3600)),
    )
    .with_observer(move |processed, total| sink.lock().unwrap().push((processed, total)));

    let items = [1, 2, 3, 4, 5, 6];
    let report = processor
        .process(&items, |batch, _, _| {
            let owned = batch.to_vec();
            async move { Ok::<_, BatchFailure>(owned) }
        })
        .await
        .unwrap();

    assert_eq!(report.windows, 6);
    assert!(reported.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_reported_once_interval_elapses() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(1)
            .with_progress_interval(Duration::from_millis(200)),
    )
    .with_observer(move |processed, total| sink.lock().unwrap().push((processed, total)));

    // only the third window is slow enough to make a report due
    let items = [1, 2, 3, 4];
    processor
        .process(&items, |batch, start, _| {
            let owned = batch.to_vec();
            async move {
                if start == 2 {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                Ok::<_, BatchFailure>(owned)
            }
        })
        .await
        .unwrap();

    assert_eq!(*reported.lock().unwrap(), vec![(3, 4)]);
}

#[tokio::test]
async fn test_progress_can_be_disabled() {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let processor = BatchProcessor::new(
        BatchOptions::default()
            .with_batch_size(1)
            .with_progress_interval(Duration::ZERO)
            .with_report_progress(false),
    )
    .with_observer(move |processed, total| sink.lock().unwrap().push((processed, total)));

    let items = [1, 2, 3];
    processor
        .process(&items, |batch, _, _| {
            let owned = batch.to_vec();
            async move { Ok::<_, BatchFailure>(owned) }
        })
        .await
        .unwrap();

    assert!(reported.lock().unwrap().is_empty());
}

#[test]
fn test_store_errors_classified() {
    assert!(matches!(
        BatchFailure::from_store_error(MigratorError::NotConnected),
        BatchFailure::Abort(_)
    ));
    assert!(matches!(
        BatchFailure::from_store_error(MigratorError::transaction("closed")),
        BatchFailure::Abort(_)
    ));
    assert!(matches!(
        BatchFailure::from_store_error(MigratorError::database("bulk upsert", "timeout")),
        BatchFailure::Skip(_)
    ));
}
