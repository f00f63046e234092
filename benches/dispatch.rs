//! Benchmarks for the dispatch engine
//!
//! This benchmark measures:
//! - Partitioning and composite request encoding
//! - Dispatcher fan-out/join overhead with an unthrottled limiter
//! - Rate limiter admission cost

use bulk_provision::batch::{Batcher, Dispatcher, FailureCollector};
use bulk_provision::generator::RecordGenerator;
use bulk_provision::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use bulk_provision::types::{UnitOutcome, WorkItem};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn bench_batching(c: &mut Criterion) {
    let mut group = c.benchmark_group("batching");
    let records = RecordGenerator::new().generate(1000);
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("build_units_1000", |b| {
        let batcher = Batcher::default();
        b.iter(|| {
            let units = batcher.build_units(black_box(records.clone())).unwrap();
            assert_eq!(units.len(), 50);
        })
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("dispatch");

    for n in [100u32, 1000] {
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("unthrottled", n), &n, |b, &n| {
            b.to_async(&rt).iter(|| async move {
                let dispatcher = Dispatcher::new(Arc::new(RateLimiter::unlimited()));
                let failures = FailureCollector::new();
                let units: Vec<WorkItem<u32>> = (0..n).map(WorkItem::Single).collect();
                let summary = dispatcher
                    .run(units, &failures, |item| async move {
                        if item.records()[0] % 10 == 0 {
                            Err(bulk_provision::SubmitError::rejected(400, "bench"))
                        } else {
                            Ok(UnitOutcome::success())
                        }
                    })
                    .await
                    .unwrap();
                black_box(summary);
            })
        });
    }

    group.bench_function("limiter_acquire_under_limit", |b| {
        b.to_async(&rt).iter(|| async {
            let limiter = RateLimiter::new(RateLimiterConfig::per_second(10_000));
            for _ in 0..1000 {
                limiter.acquire().await;
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_batching, bench_dispatch);
criterion_main!(benches);
