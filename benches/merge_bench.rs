//! Merge fold throughput over synthetic build graphs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use makegrind::critical_path::critical_path;
use makegrind::graph::{BuildGraph, Entry, Target, TargetId};
use std::time::Duration;

fn id(directory: usize, name: usize) -> TargetId {
    TargetId::new(
        format!("/proj/dir{directory}"),
        Some("Makefile"),
        format!("t{name}"),
    )
}

/// A fragment of `size` targets in one directory, chained so target i
/// depends on targets i+1 and i+2.
fn synthetic_fragment(directory: usize, size: usize) -> BuildGraph {
    let mut fragment = BuildGraph::new();
    for i in 0..size {
        let successors = (i + 1..=(i + 2).min(size.saturating_sub(1)))
            .map(|j| id(directory, j))
            .collect();
        fragment.insert(
            id(directory, i),
            Target {
                line: Some(i as u32 + 1),
                elapsed: Duration::from_millis((size - i) as u64),
                recipe: Some(Duration::from_millis(((size - i) / 2) as u64)),
                successors,
                pids: vec![directory as u32],
            },
        );
    }
    fragment
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    for &targets in &[100usize, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(targets),
            &targets,
            |b, &targets| {
                let fragments: Vec<BuildGraph> =
                    (0..8).map(|dir| synthetic_fragment(dir, targets)).collect();
                b.iter(|| {
                    let mut graph = BuildGraph::new();
                    for fragment in fragments.clone() {
                        black_box(graph.merge(fragment));
                    }
                    black_box(graph.len())
                });
            },
        );
    }
    group.finish();
}

fn bench_critical_path(c: &mut Criterion) {
    let mut graph = synthetic_fragment(0, 1000);
    graph.set_entry(Entry {
        creator: "bench".to_string(),
        argv: vec![],
        goals: vec![id(0, 0)],
    });
    c.bench_function("critical_path_1000", |b| {
        b.iter(|| black_box(critical_path(&graph, &[]).unwrap().len()))
    });
}

criterion_group!(benches, bench_merge, bench_critical_path);
criterion_main!(benches);
