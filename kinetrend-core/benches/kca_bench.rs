//! Criterion benchmarks for KineTrend hot paths.
//!
//! Benchmarks:
//! 1. KCA fit (EM + smoother) at a fixed iteration budget
//! 2. Greedy spectral selection with and without a stopping level
//! 3. Signal/position engine over long trend sequences

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use kinetrend_core::kca::{ConvergencePolicy, EmSettings, KineticConfig, KineticEstimator};
use kinetrend_core::signals::{SignalPositionEngine, TrendClassifier};
use kinetrend_core::spectral::{SpectralConfig, SpectralSelector};
use kinetrend_core::synthetic::periodic;
use kinetrend_core::Series;

// ── Helpers ──────────────────────────────────────────────────────────

fn make_series(n: usize) -> Series {
    let data = periodic(10, n, 0.5, 0);
    Series::new(data.t, data.observed).unwrap()
}

fn fixed_budget(iterations: usize) -> KineticConfig {
    KineticConfig::new(0.001).with_em(EmSettings {
        max_iterations: iterations,
        tolerance: 1e-12,
        on_non_convergence: ConvergencePolicy::Warn,
    })
}

// ── 1. KCA fit ───────────────────────────────────────────────────────

fn bench_kca_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("kca_fit");
    group.sample_size(20);

    for &n in &[100, 300, 1000] {
        let series = make_series(n);
        let estimator = KineticEstimator::new(fixed_budget(10));
        group.bench_with_input(BenchmarkId::new("em_10", n), &n, |b, _| {
            b.iter(|| estimator.fit(black_box(&series)))
        });
    }

    group.finish();
}

// ── 2. Spectral selection ────────────────────────────────────────────

fn bench_spectral(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral_select");
    group.sample_size(10);

    for &n in &[64, 300] {
        let series = make_series(n);
        let early = SpectralSelector::new(SpectralConfig::with_min_alpha(0.05));
        group.bench_with_input(BenchmarkId::new("alpha_0.05", n), &n, |b, _| {
            b.iter(|| early.select(black_box(series.values())))
        });
    }

    let series = make_series(64);
    let capped = SpectralSelector::new(SpectralConfig {
        min_alpha: None,
        max_components: Some(16),
    });
    group.bench_function("capped_16_of_64", |b| {
        b.iter(|| capped.select(black_box(series.values())))
    });

    group.finish();
}

// ── 3. Signal engine ─────────────────────────────────────────────────

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_engine");
    let classifier = TrendClassifier::default();

    for &n in &[2520, 25200] {
        let trends: Vec<_> = (0..n)
            .map(|i| {
                let t = i as f64 * 0.05;
                classifier.classify(t.cos(), -t.sin())
            })
            .collect();
        let engine = SignalPositionEngine::new(5).unwrap();
        group.bench_with_input(BenchmarkId::new("lookback_5", n), &n, |b, _| {
            b.iter(|| engine.run(black_box(&trends)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kca_fit, bench_spectral, bench_engine);
criterion_main!(benches);
