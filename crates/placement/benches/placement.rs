//! Benchmarks for initial and incremental placement.

use corelib::{ClusterMap, NodeId, PlacementConfig, PlacementTable};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use placement::{compute_incremental, compute_initial};

/// `n` nodes with weights cycling through 1..=4.
fn cluster(n: u64) -> ClusterMap {
    ClusterMap::from_weights((1..=n).map(|id| (NodeId(id), id % 4 + 1))).unwrap()
}

fn bench_initial(c: &mut Criterion) {
    let configs: &[(u64, u32, usize)] = &[(16, 10, 3), (64, 12, 3), (64, 12, 4)];

    let mut group = c.benchmark_group("placement_initial");
    for &(nodes, width, depth) in configs {
        let config = PlacementConfig::with_width(width, depth, 0).unwrap();
        let map = cluster(nodes);
        let label = format!("n{nodes}_w{width}_d{depth}");
        group.bench_with_input(BenchmarkId::new("initial", &label), &map, |b, map| {
            b.iter(|| {
                let mut table = PlacementTable::for_config(&config);
                compute_initial(&mut table, map, &config).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_incremental(c: &mut Criterion) {
    let configs: &[(u64, u32, usize)] = &[(16, 10, 3), (64, 12, 3)];

    let mut group = c.benchmark_group("placement_incremental");
    for &(nodes, width, depth) in configs {
        let config = PlacementConfig::with_width(width, depth, 0).unwrap();
        let old = cluster(nodes);
        let mut base = PlacementTable::for_config(&config);
        compute_initial(&mut base, &old, &config).unwrap();

        let mut joined = old.clone();
        joined.join(NodeId(nodes + 1), 2).unwrap();
        let label = format!("n{nodes}_w{width}_d{depth}_join");
        group.bench_with_input(BenchmarkId::new("join", &label), &joined, |b, new| {
            b.iter(|| {
                let mut table = base.clone();
                compute_incremental(&mut table, Some(&old), new, &config).unwrap()
            });
        });

        let mut left = old.clone();
        left.leave(NodeId(1));
        let label = format!("n{nodes}_w{width}_d{depth}_leave");
        group.bench_with_input(BenchmarkId::new("leave", &label), &left, |b, new| {
            b.iter(|| {
                let mut table = base.clone();
                compute_incremental(&mut table, Some(&old), new, &config).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_initial, bench_incremental);
criterion_main!(benches);
