// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Reward Scoring Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the per-completion reward path, which runs
//! once per sampled completion inside the training loop.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rlpf_core::{HeuristicExtractor, InMemoryGraph, RewardAggregator, RewardMonitor};
use rlpf_types::{Predicate, RlpfConfig};

const COMPLETION: &str = "The MIT License allows commercial use. \
    GPL cannot close source. Python was created by Guido van Rossum. \
    The sky is blue. Rust is memory safe.";

fn make_graph(n_subjects: usize) -> InMemoryGraph {
    let mut graph = InMemoryGraph::with_facts([
        Predicate::new("MIT License", "allows", "commercial use").unwrap(),
        Predicate::new("GPL", "requires", "source disclosure").unwrap(),
        Predicate::new("Python", "created_by", "Guido van Rossum").unwrap(),
        Predicate::new("sky", "is", "blue").unwrap(),
    ]);
    for i in 0..n_subjects {
        graph.add_fact(Predicate::new(format!("entity {i}"), "related_to", format!("entity {}", i + 1)).unwrap());
    }
    graph
}

fn make_aggregator(n_subjects: usize) -> RewardAggregator {
    RewardAggregator::new(
        RlpfConfig::default(),
        Arc::new(HeuristicExtractor::default()),
        Arc::new(make_graph(n_subjects)),
    )
}

// ── RewardAggregator.score() ────────────────────────────────────────

fn bench_score_small_graph(c: &mut Criterion) {
    let agg = make_aggregator(0);
    c.bench_function("reward_score_small_graph", |b| {
        b.iter(|| agg.score(black_box(COMPLETION)))
    });
}

fn bench_score_1k_graph(c: &mut Criterion) {
    let agg = make_aggregator(1_000);
    c.bench_function("reward_score_1k_graph", |b| {
        b.iter(|| agg.score(black_box(COMPLETION)))
    });
}

// ── RewardAggregator.score_group() ──────────────────────────────────

fn bench_score_group_8(c: &mut Criterion) {
    let agg = make_aggregator(100);
    let group: Vec<&str> = (0..8).map(|_| COMPLETION).collect();
    c.bench_function("reward_score_group_8", |b| {
        b.iter(|| agg.score_group(black_box(&group)))
    });
}

// ── RewardMonitor.observe() ─────────────────────────────────────────

fn bench_monitor_observe(c: &mut Criterion) {
    let monitor = RewardMonitor::new(RlpfConfig::default());
    c.bench_function("monitor_observe", |b| {
        b.iter(|| monitor.observe(black_box(0.5)))
    });
}

criterion_group!(
    benches,
    bench_score_small_graph,
    bench_score_1k_graph,
    bench_score_group_8,
    bench_monitor_observe,
);
criterion_main!(benches);
