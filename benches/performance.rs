//! Performance benchmarks for change reconciliation and dispatch.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use feedsync::{
    doc, reconcile, ChangeNotification, ChangeSource, Document, MemoryDb, Middleware, PathSpec,
    Sequence, TrackedTable,
};
use serde_json::json;
use std::sync::Arc;

fn changes(count: usize, distinct_ids: usize) -> Vec<ChangeNotification> {
    (0..count)
        .map(|i| {
            let doc = Document::new()
                .with("_id", format!("doc-{}", i % distinct_ids))
                .with("n", i as u64);
            ChangeNotification::upsert(Sequence(i as u64 + 1), doc).unwrap()
        })
        .collect()
}

/// Benchmark reconciliation with varying table sizes
fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");

    for distinct in [10, 1000, 100_000] {
        let batch = changes(10_000, distinct);
        group.bench_with_input(BenchmarkId::new("distinct_ids", distinct), &batch, |b, batch| {
            b.iter(|| {
                let mut tracked = TrackedTable::new();
                for change in batch {
                    black_box(reconcile(change, None, &mut tracked));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark the full path: store write, feed, reconcile, dispatch
fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");

    for writes in [100, 1000] {
        group.bench_with_input(BenchmarkId::new("writes", writes), &writes, |b, &writes| {
            b.iter(|| {
                let db = Arc::new(MemoryDb::new("bench"));
                let spec = PathSpec::new()
                    .with_source(db.clone() as Arc<dyn ChangeSource>)
                    .on_insert(|d| d.get("n").cloned())
                    .on_update(|d| d.get("n").cloned())
                    .on_remove(|_| None);
                let mut pump = Middleware::new(spec)
                    .unwrap()
                    .pump(|a: Option<serde_json::Value>| {
                        black_box(a);
                    })
                    .unwrap();

                for i in 0..writes {
                    db.put(doc(json!({"_id": format!("doc-{}", i), "n": i})).unwrap())
                        .unwrap();
                }
                black_box(pump.drain().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reconcile, bench_end_to_end);
criterion_main!(benches);
