//! # LogAgg Pipeline Benchmarks
//!
//! | Stage | Operation |
//! |-------|-----------|
//! | Archive | `write` into one bucket |
//! | Archive | tail `query` with and without filters |
//! | Archive | `expire` under a count rule |
//! | Hub | `publish` to several outputs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use log_archive::adapters::InMemoryKVStore;
use log_archive::{
    ArchiveApi, ArchiveConfig, ArchiveDependencies, ArchiveEngine, ArchiveQuery, RetentionPolicy,
};
use shared_bus::{BroadcastHub, MessagePublisher};
use shared_types::{Message, Severity};
use std::sync::Arc;

fn engine(keep: &[(&str, &str)]) -> ArchiveEngine {
    let config = ArchiveConfig {
        retention: RetentionPolicy::parse(keep.iter().copied()).unwrap(),
        ..ArchiveConfig::default()
    };
    ArchiveEngine::open(
        config,
        ArchiveDependencies::with_store(Box::new(InMemoryKVStore::new())),
    )
    .unwrap()
}

fn sample(i: usize) -> Message {
    Message::new("app", format!("request {i} served"))
        .with_id(format!("web-{}", i % 4))
        .with_tags([if i % 2 == 0 { "nginx" } else { "api" }])
        .with_severity(if i % 10 == 0 { Severity::Error } else { Severity::Info })
}

fn bench_archive_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive-write");
    group.throughput(Throughput::Elements(1));

    let archive = engine(&[]);
    let mut i = 0;
    group.bench_function("write", |b| {
        b.iter(|| {
            i += 1;
            archive.write(black_box(&sample(i))).unwrap()
        });
    });
    group.finish();
}

fn bench_archive_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive-query");

    let archive = engine(&[]);
    for i in 0..10_000 {
        archive.write(&sample(i)).unwrap();
    }

    for limit in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("tail", limit), &limit, |b, &limit| {
            b.iter(|| archive.query(&ArchiveQuery::new("app").limit(limit)).unwrap());
        });
    }

    group.bench_function("filtered", |b| {
        let query = ArchiveQuery::new("app")
            .host("web-1")
            .tags(["api"])
            .min_severity(Severity::Error)
            .limit(50);
        b.iter(|| archive.query(black_box(&query)).unwrap());
    });
    group.finish();
}

fn bench_archive_expire(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive-expire");
    group.bench_function("count-rule-1000", |b| {
        b.iter_batched(
            || {
                let archive = engine(&[("app", "1000")]);
                for i in 0..2000 {
                    archive.write(&sample(i)).unwrap();
                }
                archive
            },
            |archive| archive.expire().unwrap(),
            criterion::BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_hub_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("hub-publish");
    group.throughput(Throughput::Elements(1));
    let rt = tokio::runtime::Runtime::new().unwrap();

    for outputs in [1usize, 4, 16] {
        let hub = Arc::new(BroadcastHub::new());
        rt.block_on(async {
            for n in 0..outputs {
                hub.subscribe(format!("out-{n}"), |m: Message| {
                    black_box(m);
                })
                .await
                .unwrap();
            }
        });

        group.bench_with_input(BenchmarkId::new("outputs", outputs), &outputs, |b, _| {
            b.iter(|| rt.block_on(hub.publish(Message::new("app", "x"))));
        });
        rt.block_on(hub.close());
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_archive_write,
    bench_archive_query,
    bench_archive_expire,
    bench_hub_publish
);
criterion_main!(benches);
