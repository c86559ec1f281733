//! End-to-end runner tests: TOML config on disk, CSV + synthetic instruments,
//! parallel universe run, artifacts, walk-forward.

use std::io::Write;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use kinetrend_core::domain::{PositionState, Signal};
use kinetrend_core::synthetic::random_walk;
use kinetrend_runner::export::{export_walk_forward_csv, generate_report};
use kinetrend_runner::{
    load_artifacts, load_instrument, run_universe, save_artifacts, walk_forward, RunConfig,
    WalkForwardConfig,
};

fn write_prices_csv(path: &Path, n: usize, seed: u64) {
    let prices = random_walk(n, 1.10, 0.0002, 0.004, seed);
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "date,open,close").unwrap();
    // Written newest first; the loader sorts.
    for (i, p) in prices.iter().enumerate().rev() {
        let date = start + Duration::days(i as i64);
        writeln!(f, "{date},{:.6},{:.6}", p * 0.999, p).unwrap();
    }
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    std::fs::create_dir_all(dir.join("data")).unwrap();
    write_prices_csv(&dir.join("data/eurusd.csv"), 400, 5);
    let config = r#"
name = "fx"

[estimator]
noise_seed = 0.001

[estimator.em]
max_iterations = 15

[signals]
lookback = 5

[spectral]
min_alpha = 0.05
max_components = 40

[metrics]
window = 60

[[instruments]]
symbol = "EURUSD"
source = { type = "csv", path = "data/eurusd.csv", column = "close" }

[[instruments]]
symbol = "SINE"
source = { type = "periodic", periods = 10, nobs = 300, scale = 0.5, seed = 0 }
"#;
    let path = dir.join("run.toml");
    std::fs::write(&path, config).unwrap();
    path
}

// ─── Universe run ────────────────────────────────────────────────────

#[test]
fn csv_and_synthetic_universe_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let report = run_universe(&config).unwrap();

    assert_eq!(report.instruments.len(), 2);
    let fx = report.get("EURUSD").unwrap();
    assert_eq!(fx.observations, 400);
    assert!(!fx.synthetic);
    assert_eq!(fx.start_date.as_deref(), Some("2020-01-01"));
    assert_eq!(fx.end_date.as_deref(), Some("2021-02-03"));
    assert_eq!(fx.signals.len(), 400);

    let sine = report.get("SINE").unwrap();
    assert!(sine.synthetic);
    assert!(sine.truth_correlation.unwrap() > 0.9);
}

#[test]
fn every_instrument_keeps_position_discipline() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let report = run_universe(&config).unwrap();

    for r in &report.instruments {
        // Issued signals alternate open/close, so Held follows every odd-numbered one.
        let mut held = false;
        for (signal, position) in r.signals.iter().zip(&r.positions) {
            if signal.is_issued() {
                held = !held;
            }
            let expected = if held {
                PositionState::Held
            } else {
                PositionState::Flat
            };
            assert_eq!(*position, expected, "{}", r.symbol);
        }
        assert!(r.signals[..5].iter().all(|s| *s == Signal::None));
        assert!(r.exposure.iter().all(|e| [-1.0, 0.0, 1.0].contains(e)));
        assert_eq!(r.exposure[0], 0.0);
        assert_eq!(r.metrics.trade_count, r.signals.iter().filter(|s| s.is_issued()).count());
    }
}

#[test]
fn rolling_metrics_have_zeroed_warm_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let report = run_universe(&config).unwrap();
    let perf = &report.get("EURUSD").unwrap().performance;

    assert_eq!(perf.window, 60);
    for series in [
        &perf.rolling_pnl,
        &perf.rolling_returns,
        &perf.rolling_volatility,
        &perf.rolling_sharpe,
    ] {
        assert_eq!(series.len(), 400);
        assert!(series[..59].iter().all(|v| *v == 0.0));
    }
}

#[test]
fn identical_configs_reproduce_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let a = run_universe(&config).unwrap();
    let b = run_universe(&config).unwrap();
    assert_eq!(a.run_id, b.run_id);
    for (x, y) in a.instruments.iter().zip(&b.instruments) {
        assert_eq!(x.signals, y.signals);
        assert_eq!(x.kinematics, y.kinematics);
        assert_eq!(x.dataset_hash, y.dataset_hash);
    }
}

// ─── Artifacts ───────────────────────────────────────────────────────

#[test]
fn artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let report = run_universe(&config).unwrap();

    let out = dir.path().join("out");
    let run_dir = save_artifacts(&report, &out).unwrap();
    assert!(run_dir.join("EURUSD_signals.csv").exists());
    assert!(run_dir.join("SINE_signals.csv").exists());

    let signals_csv = std::fs::read_to_string(run_dir.join("EURUSD_signals.csv")).unwrap();
    assert_eq!(signals_csv.lines().count(), 401);
    assert!(signals_csv.lines().nth(1).unwrap().starts_with("0,2020-01-01,"));

    let loaded = load_artifacts(&run_dir).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.instruments[0].signals, report.instruments[0].signals);

    let md = generate_report(&loaded);
    assert!(md.contains("| EURUSD | 400 |"));
}

// ─── Walk-forward ────────────────────────────────────────────────────

#[test]
fn walk_forward_over_csv_series() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig::from_file(&write_config(dir.path())).unwrap();
    let loaded = load_instrument(&config.instruments[0]).unwrap();

    let wf = WalkForwardConfig {
        train_window: 120,
        days: 12,
        estimator: config.estimator.clone(),
    };
    let report = walk_forward(&loaded.series, &wf).unwrap();
    assert_eq!(report.steps.len(), 12);
    assert_eq!(report.steps[0].index, 388);
    assert!((0.0..=1.0).contains(&report.hit_ratio));
    assert_eq!(report.hits, report.steps.iter().filter(|s| s.hit).count());
    for s in &report.steps {
        assert!(s.decision.is_issued());
        assert_eq!(s.realized, loaded.series.values()[s.index]);
    }

    let csv = export_walk_forward_csv(&report).unwrap();
    assert_eq!(csv.lines().count(), 13);
}
