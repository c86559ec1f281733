//! Next-step directional call from a one-step kinetic forecast.

use serde::{Deserialize, Serialize};

use crate::domain::{Series, Signal};
use crate::kca::{EstimationError, KineticConfig, KineticEstimator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastDecision {
    /// Forecast position one step past the last observation.
    pub predicted: f64,
    pub last_observed: f64,
    /// `Buy` when the forecast is above the last observation, otherwise `Sell`.
    pub signal: Signal,
}

/// Fit `series` with one forecast step and call the direction of the next move.
///
/// `config.forecast_steps` is overridden to 1.
pub fn forecast_signal(
    series: &Series,
    config: &KineticConfig,
) -> Result<ForecastDecision, EstimationError> {
    let config = config.clone().with_forecast(1);
    let fit = KineticEstimator::new(config).fit(series)?;
    let predicted = fit.means[fit.diagnostics.observed].position;
    let last_observed = series.last_value();
    let signal = if predicted > last_observed {
        Signal::Buy
    } else {
        Signal::Sell
    };
    Ok(ForecastDecision {
        predicted,
        last_observed,
        signal,
    })
}
