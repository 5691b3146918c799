use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use widegraph::attrs;
use widegraph::backend::MemoryBackend;
use widegraph::graph::{GraphStore, Node};

fn populated(size: usize) -> (GraphStore<MemoryBackend>, Node) {
    let store = GraphStore::new(MemoryBackend::new());
    let hub = store
        .create_node("person", "hub", attrs! { "name" => "hub" })
        .unwrap();
    for i in 0..size {
        let spoke = store
            .create_node("person", &format!("p{}", i), attrs! { "age" => (i % 100) as i64 })
            .unwrap();
        let rel_type = if i % 2 == 0 { "knows" } else { "follows" };
        store
            .create_relationship(rel_type, &hub, &spoke, None, attrs! { "weight" => 0.5 })
            .unwrap();
    }
    (store, hub)
}

/// Benchmark node insertion throughput, including type indexing
fn bench_node_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insertion");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let store = GraphStore::new(MemoryBackend::new());
                for i in 0..size {
                    store
                        .create_node("person", &format!("p{}", i), attrs! { "age" => (i % 100) as i64 })
                        .unwrap();
                }
            });
        });
    }
    group.finish();
}

/// Benchmark type-scoped relationship scans
fn bench_typed_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("typed_scan");

    for size in [100, 1000].iter() {
        let (store, hub) = populated(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let rels = store.get_outgoing_by_type(&hub, "knows", size).unwrap();
                criterion::black_box(rels.len());
            });
        });
    }
    group.finish();
}

/// Benchmark existence-index lookups
fn bench_has_relationship(c: &mut Criterion) {
    let (store, hub) = populated(1000);
    c.bench_function("has_relationship", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("p{}", i % 1000);
            i += 1;
            criterion::black_box(store.has_relationship(&hub, &key, "knows").unwrap());
        });
    });
}

/// Benchmark save_node fan-out over embedded copies
fn bench_save_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_node");

    for size in [100, 1000].iter() {
        let (store, mut hub) = populated(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut n = 0i64;
            b.iter(|| {
                n += 1;
                hub.set("visits", n);
                store.save_node(&hub).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_node_insertion,
    bench_typed_scan,
    bench_has_relationship,
    bench_save_node
);
criterion_main!(benches);
