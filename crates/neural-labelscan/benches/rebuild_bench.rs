//! Label Scan Benchmark
//!
//! Measures:
//! - Full rebuild throughput per backend and batch size
//! - Label query latency on a rebuilt index

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use neural_core::{LabelId, LabelSet, NodeId};
use neural_labelscan::backend::InMemoryDirectoryFactory;
use neural_labelscan::{LabelScanStore, NodeLabels, RebuildCoordinator};
use std::sync::Arc;
use tempfile::TempDir;

/// Generates `num_nodes` nodes carrying 1-3 of `num_labels` labels each.
fn generate_nodes(num_nodes: u64, num_labels: u32) -> Vec<NodeLabels> {
    (0..num_nodes)
        .map(|i| {
            let labels: LabelSet = (0..=(i % 3) as u32)
                .map(|offset| LabelId::new((i as u32).wrapping_add(offset * 7) % num_labels))
                .collect();
            NodeLabels::new(NodeId::new(i), labels)
        })
        .collect()
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("Rebuild");
    group.sample_size(10);

    let nodes = generate_nodes(20_000, 64);
    group.throughput(Throughput::Elements(nodes.len() as u64));

    for batch_size in [1_000usize, 10_000] {
        group.bench_with_input(
            BenchmarkId::new("in-memory", batch_size),
            &batch_size,
            |b, &batch_size| {
                let temp_dir = TempDir::new().unwrap();
                let store = LabelScanStore::builder(temp_dir.path())
                    .directory_factory(Arc::new(InMemoryDirectoryFactory::new()))
                    .build()
                    .unwrap();
                let coordinator = RebuildCoordinator::new(batch_size);
                b.iter(|| coordinator.rebuild(&store, &nodes).unwrap());
            },
        );

        group.bench_with_input(
            BenchmarkId::new("tantivy", batch_size),
            &batch_size,
            |b, &batch_size| {
                let temp_dir = TempDir::new().unwrap();
                let store = LabelScanStore::builder(temp_dir.path()).build().unwrap();
                let coordinator = RebuildCoordinator::new(batch_size);
                b.iter(|| coordinator.rebuild(&store, &nodes).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("Label Query");

    let temp_dir = TempDir::new().unwrap();
    let store = LabelScanStore::builder(temp_dir.path())
        .full_store_stream(Arc::new(generate_nodes(50_000, 16)))
        .build()
        .unwrap();
    store.start().unwrap();

    group.bench_function("query_full_scan", |b| {
        b.iter(|| store.query(black_box(LabelId::new(3))).unwrap().count())
    });
    group.bench_function("node_count_for", |b| {
        b.iter(|| store.node_count_for(black_box(LabelId::new(3))).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_rebuild, bench_query);
criterion_main!(benches);
