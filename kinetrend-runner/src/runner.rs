//! Universe runner: wires loading, estimation, signals and metrics per instrument.
//!
//! Two entry points:
//! - `run_instrument()`: pre-loaded series in, result out. No I/O.
//! - `run_universe()`: loads every configured instrument and runs them across rayon workers.

use std::time::Instant;

use chrono::NaiveDate;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kinetrend_core::domain::{KinematicState, PositionState, Signal, TrendLabel};
use kinetrend_core::kca::{EstimationError, KineticEstimator};
use kinetrend_core::signals::EngineError;
use kinetrend_core::spectral::{SelectionError, SpectralSelector, Termination, WhitenessTest};
use kinetrend_core::stats::correlation;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_instrument, LoadError, LoadedSeries};
use crate::metrics::{PerformanceMetrics, PerformanceSeries};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("estimation failed for '{symbol}': {source}")]
    Estimation {
        symbol: String,
        #[source]
        source: EstimationError,
    },

    #[error("signal engine failed for '{symbol}': {source}")]
    Engine {
        symbol: String,
        #[source]
        source: EngineError,
    },

    #[error("spectral selection failed for '{symbol}': {source}")]
    Spectral {
        symbol: String,
        #[source]
        source: SelectionError,
    },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Estimator diagnostics worth keeping in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub iterations: usize,
    pub converged: bool,
    pub log_likelihood: f64,
    pub step: f64,
    /// Learned observation noise variance.
    pub observation_noise: f64,
}

/// Spectral benchmark against the kinetic position estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralComparison {
    pub components: usize,
    pub termination: Termination,
    pub whiteness: Option<WhitenessTest>,
    /// Pearson correlation of the spectral reconstruction with the KCA position.
    pub correlation_with_kca: f64,
    pub series: Vec<f64>,
}

/// Complete result for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Calendar date per observation (CSV sources only).
    pub dates: Option<Vec<NaiveDate>>,
    pub observations: usize,
    pub prices: Vec<f64>,
    pub fit: FitSummary,
    /// Smoothed states over the observed range.
    pub kinematics: Vec<KinematicState>,
    pub stdevs: Vec<KinematicState>,
    /// Predict-only states past the last observation.
    pub forecast: Vec<KinematicState>,
    pub trends: Vec<Option<TrendLabel>>,
    pub signals: Vec<Signal>,
    pub positions: Vec<PositionState>,
    pub exposure: Vec<f64>,
    pub performance: PerformanceSeries,
    pub metrics: PerformanceMetrics,
    pub spectral: Option<SpectralComparison>,
    /// Correlation of the KCA position with the noiseless source (periodic sources only).
    pub truth_correlation: Option<f64>,
}

/// Results for a whole configured universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    pub instruments: Vec<InstrumentResult>,
}

impl RunReport {
    pub fn get(&self, symbol: &str) -> Option<&InstrumentResult> {
        self.instruments.iter().find(|r| r.symbol == symbol)
    }
}

/// Run the full pipeline for one pre-loaded instrument.
///
/// fit → classify → signal engine → exposure → metrics, plus the optional spectral
/// comparison. Pure computation on the given series.
pub fn run_instrument(config: &RunConfig, loaded: &LoadedSeries) -> Result<InstrumentResult, RunError> {
    run_instrument_until(config, loaded, None)
}

/// As [`run_instrument`], with a wall-clock deadline passed to the estimator and selector.
pub fn run_instrument_until(
    config: &RunConfig,
    loaded: &LoadedSeries,
    deadline: Option<Instant>,
) -> Result<InstrumentResult, RunError> {
    let symbol = loaded.symbol.as_str();
    let prices = loaded.series.values();

    let mut estimator = KineticEstimator::new(config.estimator.clone());
    if let Some(d) = deadline {
        estimator = estimator.with_deadline(d);
    }
    let fit = estimator
        .fit(&loaded.series)
        .map_err(|source| RunError::Estimation {
            symbol: symbol.to_string(),
            source,
        })?;

    let classifier = config.signals.classifier();
    let trends = fit.trends(&classifier);
    let engine_err = |source| RunError::Engine {
        symbol: symbol.to_string(),
        source,
    };
    let engine = config.signals.engine()?;
    let track = engine.run(&trends).map_err(engine_err)?;
    track
        .validate()
        .map_err(|e| engine_err(EngineError::State(e)))?;

    let exposure = track.exposure();
    let performance = PerformanceSeries::compute(prices, &exposure, config.metrics.window);
    let metrics = PerformanceMetrics::compute(&performance, &exposure, track.trade_count());

    let kinematics = fit.observed().to_vec();
    let positions: Vec<f64> = kinematics.iter().map(|s| s.position).collect();

    let spectral = match &config.spectral {
        Some(spectral_config) => {
            let mut selector = SpectralSelector::new(spectral_config.clone());
            if let Some(d) = deadline {
                selector = selector.with_deadline(d);
            }
            let reconstruction = selector.select(prices).map_err(|source| RunError::Spectral {
                symbol: symbol.to_string(),
                source,
            })?;
            Some(SpectralComparison {
                components: reconstruction.admitted.len(),
                termination: reconstruction.termination,
                whiteness: reconstruction.whiteness,
                correlation_with_kca: correlation(&reconstruction.series, &positions),
                series: reconstruction.series,
            })
        }
        None => None,
    };

    let truth_correlation = loaded.truth.as_ref().map(|truth| correlation(&positions, truth));
    let observed = fit.diagnostics.observed;

    tracing::info!(
        symbol,
        observations = observed,
        em_iterations = fit.diagnostics.iterations,
        converged = fit.diagnostics.converged,
        trades = metrics.trade_count,
        total_pnl = metrics.total_pnl,
        "instrument complete"
    );

    Ok(InstrumentResult {
        schema_version: SCHEMA_VERSION,
        symbol: symbol.to_string(),
        dataset_hash: loaded.dataset_hash.clone(),
        synthetic: loaded.synthetic,
        start_date: loaded
            .dates
            .as_ref()
            .and_then(|d| d.first())
            .map(|d| d.to_string()),
        end_date: loaded
            .dates
            .as_ref()
            .and_then(|d| d.last())
            .map(|d| d.to_string()),
        dates: loaded.dates.clone(),
        observations: observed,
        prices: prices.to_vec(),
        fit: FitSummary {
            iterations: fit.diagnostics.iterations,
            converged: fit.diagnostics.converged,
            log_likelihood: fit.diagnostics.log_likelihood,
            step: fit.diagnostics.step,
            observation_noise: fit.diagnostics.model.observation_variance,
        },
        stdevs: fit.stdevs[..observed].to_vec(),
        forecast: fit.forecast().to_vec(),
        kinematics,
        trends,
        signals: track.signals(),
        positions: track.positions(),
        exposure,
        performance,
        metrics,
        spectral,
        truth_correlation,
    })
}

/// Load and run every configured instrument in parallel.
///
/// Results keep the config's instrument order. The first failure aborts the run.
pub fn run_universe(config: &RunConfig) -> Result<RunReport, RunError> {
    config.validate()?;
    let run_id = config.run_id()?;
    tracing::info!(
        run = %config.name,
        run_id = %&run_id[..12],
        instruments = config.instruments.len(),
        "starting universe run"
    );

    let instruments = config
        .instruments
        .par_iter()
        .map(|spec| {
            let loaded = load_instrument(spec)?;
            run_instrument(config, &loaded)
        })
        .collect::<Result<Vec<_>, RunError>>()?;

    Ok(RunReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        instruments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstrumentSpec, SourceSpec};
    use kinetrend_core::kca::KineticConfig;

    fn periodic_config() -> RunConfig {
        RunConfig::from_toml(
            r#"
name = "unit"

[estimator]
noise_seed = 0.001

[estimator.em]
max_iterations = 20

[signals]
lookback = 5

[spectral]
min_alpha = 0.05

[metrics]
window = 20

[[instruments]]
symbol = "SINE"
source = { type = "periodic", periods = 10, nobs = 300, scale = 0.5, seed = 0 }
"#,
        )
        .unwrap()
    }

    #[test]
    fn instrument_result_is_aligned() {
        let config = periodic_config();
        let loaded = load_instrument(&config.instruments[0]).unwrap();
        let result = run_instrument(&config, &loaded).unwrap();

        assert_eq!(result.observations, 300);
        assert_eq!(result.kinematics.len(), 300);
        assert_eq!(result.stdevs.len(), 300);
        assert!(result.forecast.is_empty());
        assert_eq!(result.trends.len(), 300);
        assert_eq!(result.signals.len(), 300);
        assert_eq!(result.positions.len(), 300);
        assert_eq!(result.exposure.len(), 300);
        assert_eq!(result.performance.len(), 300);
        assert!(result.synthetic);
        assert!(result.start_date.is_none());
    }

    #[test]
    fn periodic_position_tracks_truth() {
        let config = periodic_config();
        let loaded = load_instrument(&config.instruments[0]).unwrap();
        let result = run_instrument(&config, &loaded).unwrap();
        let corr = result.truth_correlation.unwrap();
        assert!(corr > 0.9, "KCA vs truth correlation {corr}");
        let spectral = result.spectral.unwrap();
        assert!(spectral.correlation_with_kca > 0.8, "{}", spectral.correlation_with_kca);
    }

    #[test]
    fn spectral_skipped_when_unconfigured() {
        let mut config = periodic_config();
        config.spectral = None;
        let loaded = load_instrument(&config.instruments[0]).unwrap();
        assert!(run_instrument(&config, &loaded).unwrap().spectral.is_none());
    }

    #[test]
    fn forecast_states_are_reported() {
        let mut config = periodic_config();
        config.estimator = KineticConfig::new(0.001).with_forecast(3);
        let loaded = load_instrument(&config.instruments[0]).unwrap();
        let result = run_instrument(&config, &loaded).unwrap();
        assert_eq!(result.forecast.len(), 3);
        assert_eq!(result.kinematics.len(), 300);
    }

    #[test]
    fn too_short_series_is_estimation_error() {
        let mut config = periodic_config();
        config.instruments[0].source = SourceSpec::Periodic {
            periods: 1,
            nobs: 3,
            scale: 0.1,
            seed: 0,
        };
        let loaded = load_instrument(&config.instruments[0]).unwrap();
        let err = run_instrument(&config, &loaded).unwrap_err();
        assert!(matches!(err, RunError::Estimation { .. }), "{err}");
    }

    #[test]
    fn universe_keeps_instrument_order() {
        let mut config = periodic_config();
        config.spectral = None;
        config.instruments.push(InstrumentSpec {
            symbol: "WALK".into(),
            source: SourceSpec::RandomWalk {
                n: 200,
                start: 100.0,
                drift: 0.0005,
                vol: 0.01,
                seed: 3,
            },
        });
        let report = run_universe(&config).unwrap();
        let symbols: Vec<&str> = report.instruments.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["SINE", "WALK"]);
        assert_eq!(report.run_id, config.run_id().unwrap());
        assert!(report.get("WALK").is_some());
        assert!(report.get("NOPE").is_none());
    }

    #[test]
    fn missing_csv_fails_universe() {
        let mut config = periodic_config();
        config.instruments.push(InstrumentSpec {
            symbol: "GONE".into(),
            source: SourceSpec::Csv {
                path: "/no/such/file.csv".into(),
                column: None,
            },
        });
        assert!(matches!(run_universe(&config), Err(RunError::Data(_))));
    }
}
