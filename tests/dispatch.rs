use bulk_provision::batch::{Batcher, BatcherConfig, Dispatcher, FailureCollector};
use bulk_provision::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use bulk_provision::service::InMemoryRecordService;
use bulk_provision::types::{UnitOutcome, WorkItem};
use bulk_provision::{RecordService, UserRecord};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_test::assert_ok;

fn launches_within(times: &[Instant], from: Instant, window: Duration) -> usize {
    times
        .iter()
        .filter(|t| **t >= from && **t < from + window)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_no_window_exceeds_limit() {
    let limit = 5;
    let interval = Duration::from_secs(1);
    let limiter = RateLimiter::new(RateLimiterConfig::per_second(limit).with_interval(interval));
    let dispatcher = Dispatcher::new(Arc::new(limiter));
    let failures = FailureCollector::new();

    let launched = Arc::new(Mutex::new(Vec::new()));
    let log = launched.clone();
    let units: Vec<WorkItem<u32>> = (0..23).map(WorkItem::Single).collect();

    let summary = assert_ok!(
        dispatcher
            .run(units, &failures, move |_| {
                log.lock().unwrap().push(Instant::now());
                async {
                    tokio::time::sleep(Duration::from_millis(1500)).await;
                    Ok(UnitOutcome::success())
                }
            })
            .await
    );

    assert_eq!(summary.succeeded, 23);
    let times = launched.lock().unwrap().clone();
    assert_eq!(times.len(), 23);
    for t in &times {
        assert!(launches_within(&times, *t, interval) <= limit as usize);
    }
    // 23 launches at 5 per second cannot finish launching before 4 seconds.
    assert!(summary.elapsed >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn test_zero_limit_does_not_throttle() {
    let dispatcher = Dispatcher::new(Arc::new(RateLimiter::new(RateLimiterConfig::from_limit(
        -1,
    ))));
    let failures = FailureCollector::new();
    let started = Instant::now();

    let units: Vec<WorkItem<u32>> = (0..500).map(WorkItem::Single).collect();
    let summary = assert_ok!(
        dispatcher
            .run(units, &failures, |_| async { Ok(UnitOutcome::success()) })
            .await
    );

    assert_eq!(summary.succeeded, 500);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_batches_against_in_memory_service() {
    let service = Arc::new(
        InMemoryRecordService::new()
            .with_failure_rule(|u| u.display_name.ends_with('7'))
            .with_latency(Duration::from_millis(200)),
    );
    let records: Vec<UserRecord> = (0..50)
        .map(|i| UserRecord {
            display_name: format!("user {}", i),
            ..Default::default()
        })
        .collect();

    let units = assert_ok!(
        Batcher::new(BatcherConfig::new().with_batch_size(8)).build_units(records)
    );
    assert_eq!(units.len(), 7);

    let dispatcher = Dispatcher::new(Arc::new(RateLimiter::new(RateLimiterConfig::per_second(
        3,
    ))));
    let failures = FailureCollector::new();
    let svc = service.clone();
    let summary = assert_ok!(
        dispatcher
            .run(units, &failures, move |unit| {
                let svc = svc.clone();
                async move {
                    let batch = match unit.as_ref() {
                        WorkItem::Batch(batch) => batch,
                        WorkItem::Single(_) => unreachable!("batch units only"),
                    };
                    svc.create_batch(&batch.request)
                        .await
                        .map(|response| response.into_outcome(batch.records.len()))
                }
            })
            .await
    );

    // user 7, 17, 27, 37, 47
    assert_eq!(summary.failed, 5);
    assert_eq!(summary.succeeded, 45);
    assert_eq!(service.batch_calls(), 7);

    let mut failed: Vec<String> = failures
        .records()
        .into_iter()
        .map(|u| u.display_name)
        .collect();
    failed.sort();
    assert_eq!(
        failed,
        vec!["user 17", "user 27", "user 37", "user 47", "user 7"]
    );
}
