//! KineTrend Runner — configured runs over instrument universes.
//!
//! This crate builds on `kinetrend-core` to provide:
//! - TOML run configuration with a BLAKE3 run id
//! - Series loading from dated CSV files or seeded synthetic generators
//! - Per-instrument pipeline (fit, classify, signal engine, metrics, spectral comparison)
//!   fanned out across rayon workers
//! - Performance metrics over the signal exposure
//! - Walk-forward scoring of one-step forecasts
//! - JSON, CSV and Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod walk_forward;

pub use config::{ConfigError, InstrumentSpec, RunConfig, RunId, SourceSpec};
pub use data_loader::{load_csv, load_instrument, LoadError, LoadedSeries};
pub use export::{load_artifacts, save_artifacts};
pub use metrics::{PerformanceMetrics, PerformanceSeries};
pub use runner::{run_instrument, run_universe, InstrumentResult, RunError, RunReport};
pub use walk_forward::{walk_forward, WalkForwardConfig, WalkForwardError, WalkForwardReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<WalkForwardConfig>();
        assert_sync::<WalkForwardConfig>();
    }

    #[test]
    fn loaded_series_is_send_sync() {
        assert_send::<LoadedSeries>();
        assert_sync::<LoadedSeries>();
    }

    #[test]
    fn results_are_send_sync() {
        assert_send::<InstrumentResult>();
        assert_sync::<InstrumentResult>();
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
        assert_send::<WalkForwardReport>();
        assert_sync::<WalkForwardReport>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<WalkForwardError>();
        assert_sync::<WalkForwardError>();
    }
}
