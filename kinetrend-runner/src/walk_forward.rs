//! Walk-forward evaluation of one-step kinetic forecasts.
//!
//! The last `days` observations are the test period. For each test step the
//! estimator is refit on the trailing `train_window` observations before it, a
//! one-step forecast gives a buy/sell decision, and the decision is scored against
//! the realized move. Steps are independent and run across rayon workers.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kinetrend_core::domain::{Series, SeriesError, Signal};
use kinetrend_core::forecast::forecast_signal;
use kinetrend_core::kca::{EstimationError, KineticConfig, MIN_OBSERVATIONS};

// ─── Configuration ───────────────────────────────────────────────────

/// Configuration for walk-forward evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Trailing observations per refit (default 360, about four quarters of days).
    #[serde(default = "default_train_window")]
    pub train_window: usize,
    /// Number of test steps (default 30).
    #[serde(default = "default_days")]
    pub days: usize,
    pub estimator: KineticConfig,
}

fn default_train_window() -> usize {
    360
}

fn default_days() -> usize {
    30
}

impl WalkForwardConfig {
    pub fn new(estimator: KineticConfig) -> Self {
        Self {
            train_window: default_train_window(),
            days: default_days(),
            estimator,
        }
    }

    pub fn validate(&self) -> Result<(), WalkForwardError> {
        if self.train_window < MIN_OBSERVATIONS {
            return Err(WalkForwardError::InvalidWindow(self.train_window));
        }
        self.estimator
            .validate()
            .map_err(|source| WalkForwardError::Estimation { index: 0, source })
    }

    /// Observations needed to evaluate every test step.
    pub fn required_observations(&self) -> usize {
        self.train_window + self.days
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalkForwardError {
    #[error("need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("train window must be at least {min}, got {0}", min = MIN_OBSERVATIONS)]
    InvalidWindow(usize),

    #[error("estimation failed at index {index}: {source}")]
    Estimation {
        index: usize,
        #[source]
        source: EstimationError,
    },

    #[error("invalid training slice: {0}")]
    Series(#[from] SeriesError),
}

// ─── Result types ────────────────────────────────────────────────────

/// One scored forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardStep {
    /// Index of the forecast observation in the full series.
    pub index: usize,
    pub last_observed: f64,
    pub predicted: f64,
    pub realized: f64,
    pub decision: Signal,
    /// Decision direction matched the sign of `realized - last_observed`.
    pub hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub train_window: usize,
    pub steps: Vec<WalkForwardStep>,
    pub hits: usize,
    /// `hits / steps`; 0 with no steps.
    pub hit_ratio: f64,
    /// Root mean squared error of predicted vs realized values.
    pub rmse: f64,
}

// ─── Evaluation ──────────────────────────────────────────────────────

/// Refit and score each of the last `config.days` observations.
pub fn walk_forward(
    series: &Series,
    config: &WalkForwardConfig,
) -> Result<WalkForwardReport, WalkForwardError> {
    config.validate()?;
    let n = series.len();
    let required = config.required_observations();
    if n < required {
        return Err(WalkForwardError::InsufficientData {
            required,
            actual: n,
        });
    }

    let values = series.values();
    let first = n - config.days;
    let steps = (first..n)
        .into_par_iter()
        .map(|index| {
            let train = series.slice(index - config.train_window, index)?;
            let decision = forecast_signal(&train, &config.estimator)
                .map_err(|source| WalkForwardError::Estimation { index, source })?;
            let realized = values[index];
            let change = realized - decision.last_observed;
            let hit = match decision.signal {
                Signal::Buy => change > 0.0,
                Signal::Sell => change < 0.0,
                Signal::None => false,
            };
            Ok(WalkForwardStep {
                index,
                last_observed: decision.last_observed,
                predicted: decision.predicted,
                realized,
                decision: decision.signal,
                hit,
            })
        })
        .collect::<Result<Vec<_>, WalkForwardError>>()?;

    let hits = steps.iter().filter(|s| s.hit).count();
    let predicted: Vec<f64> = steps.iter().map(|s| s.predicted).collect();
    let realized: Vec<f64> = steps.iter().map(|s| s.realized).collect();
    let hit_ratio = if steps.is_empty() {
        0.0
    } else {
        hits as f64 / steps.len() as f64
    };
    tracing::info!(steps = steps.len(), hits, hit_ratio, "walk-forward complete");

    Ok(WalkForwardReport {
        train_window: config.train_window,
        rmse: rmse(&realized, &predicted),
        steps,
        hits,
        hit_ratio,
    })
}

/// Root mean squared error over the common prefix; 0 when empty.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / n as f64).sqrt()
}
