//! Kinetic Component Analysis — position, velocity and acceleration of a noisy series.
//!
//! A constant-acceleration state-space model is fitted by Expectation-Maximization,
//! smoothed over the whole series, and optionally extrapolated forward:
//!
//! 1. Step `h = (t_last - t_first) / n` fixes the transition matrix.
//! 2. Process noise is seeded with `noise_seed * I`.
//! 3. EM refines process noise, observation noise and the initial state until the
//!    relative log-likelihood change falls under `tolerance` or `max_iterations`
//!    is reached.
//! 4. Kalman filter + RTS smoother give the posterior at every observation.
//! 5. `forecast_steps` predict-only steps continue from the last smoothed state.

pub mod model;

mod em;
mod smoother;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

use crate::domain::{KinematicCovariance, KinematicState, Series, TrendLabel};
use crate::signals::TrendClassifier;

pub use model::{transition_matrix, StateSpaceModel};

/// Minimum number of observations for a determined fit.
pub const MIN_OBSERVATIONS: usize = 4;

/// Errors raised while fitting the kinematic model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("process noise seed must be finite and > 0, got {0}")]
    InvalidNoiseSeed(f64),

    #[error("invalid EM settings: {0}")]
    InvalidSettings(String),

    #[error("{what} is not positive definite at step {step}")]
    NotPositiveDefinite { what: &'static str, step: usize },

    #[error("{component} variance is negative or non-finite at step {step}: {value}")]
    InvalidVariance {
        component: &'static str,
        step: usize,
        value: f64,
    },

    #[error("EM did not converge after {iterations} iterations (last relative change {relative_change:e})")]
    NotConverged {
        iterations: usize,
        relative_change: f64,
    },

    #[error("deadline exceeded after {iterations} EM iterations")]
    DeadlineExceeded { iterations: usize },
}

/// What to do when EM hits its iteration ceiling without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergencePolicy {
    /// Log a warning and return the fit with `converged = false`.
    #[default]
    Warn,
    /// Fail with [`EstimationError::NotConverged`].
    Fail,
}

/// EM stopping rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmSettings {
    pub max_iterations: usize,
    /// Relative log-likelihood change treated as converged.
    pub tolerance: f64,
    pub on_non_convergence: ConvergencePolicy,
}

impl Default for EmSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-4,
            on_non_convergence: ConvergencePolicy::Warn,
        }
    }
}

/// Estimator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticConfig {
    /// Multiplier of the identity used to seed the process-noise covariance.
    pub noise_seed: f64,
    /// Number of predict-only steps appended after the last observation.
    #[serde(default)]
    pub forecast_steps: usize,
    #[serde(default)]
    pub em: EmSettings,
}

impl KineticConfig {
    pub fn new(noise_seed: f64) -> Self {
        Self {
            noise_seed,
            forecast_steps: 0,
            em: EmSettings::default(),
        }
    }

    pub fn with_forecast(mut self, steps: usize) -> Self {
        self.forecast_steps = steps;
        self
    }

    pub fn with_em(mut self, em: EmSettings) -> Self {
        self.em = em;
        self
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.noise_seed.is_finite() && self.noise_seed > 0.0) {
            return Err(EstimationError::InvalidNoiseSeed(self.noise_seed));
        }
        if self.em.max_iterations == 0 {
            return Err(EstimationError::InvalidSettings(
                "max_iterations must be >= 1".into(),
            ));
        }
        if !(self.em.tolerance.is_finite() && self.em.tolerance > 0.0) {
            return Err(EstimationError::InvalidSettings(format!(
                "tolerance must be finite and > 0, got {}",
                self.em.tolerance
            )));
        }
        Ok(())
    }
}

/// How the fit went, alongside the learned parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Time step used by the transition matrix.
    pub step: f64,
    pub observed: usize,
    pub forecast_steps: usize,
    pub iterations: usize,
    pub converged: bool,
    pub log_likelihood: f64,
    pub model: StateSpaceModel,
}

/// Smoothed (and forecast) kinematics; all sequences have length `observed + forecast_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KineticFit {
    pub means: Vec<KinematicState>,
    pub stdevs: Vec<KinematicState>,
    pub covariances: Vec<KinematicCovariance>,
    pub diagnostics: FitDiagnostics,
}

impl KineticFit {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }

    /// Smoothed states over the observed range only.
    pub fn observed(&self) -> &[KinematicState] {
        &self.means[..self.diagnostics.observed]
    }

    /// Forecast states beyond the last observation.
    pub fn forecast(&self) -> &[KinematicState] {
        &self.means[self.diagnostics.observed..]
    }

    pub fn positions(&self) -> Vec<f64> {
        self.means.iter().map(|s| s.position).collect()
    }

    /// Trend label per observed timestep.
    pub fn trends(&self, classifier: &TrendClassifier) -> Vec<Option<TrendLabel>> {
        self.observed()
            .iter()
            .map(|s| classifier.classify(s.velocity, s.acceleration))
            .collect()
    }
}

/// Fits the kinematic model to a series.
#[derive(Debug, Clone)]
pub struct KineticEstimator {
    config: KineticConfig,
    deadline: Option<Instant>,
}

impl KineticEstimator {
    pub fn new(config: KineticConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Abort EM with [`EstimationError::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &KineticConfig {
        &self.config
    }

    pub fn fit(&self, series: &Series) -> Result<KineticFit, EstimationError> {
        self.config.validate()?;
        let n = series.len();
        if n < MIN_OBSERVATIONS {
            return Err(EstimationError::InsufficientData {
                required: MIN_OBSERVATIONS,
                actual: n,
            });
        }

        let step = (series.last_time() - series.first_time()) / n as f64;
        let z = series.values();
        let em = &self.config.em;
        let mut model = StateSpaceModel::kinematic(step, self.config.noise_seed);

        let mut iterations = 0;
        let mut log_likelihood = f64::NEG_INFINITY;
        let mut relative_change = f64::INFINITY;
        let mut converged = false;

        let smoothed = loop {
            let filtered = smoother::filter(&model, z)?;
            let smoothed = smoother::smooth(&model, &filtered)?;

            if iterations > 0 {
                relative_change = (filtered.log_likelihood - log_likelihood).abs()
                    / filtered.log_likelihood.abs().max(1.0);
                converged = relative_change <= em.tolerance;
            }
            log_likelihood = filtered.log_likelihood;
            tracing::debug!(iterations, log_likelihood, relative_change, "kca em step");

            if converged || iterations == em.max_iterations {
                break smoothed;
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(EstimationError::DeadlineExceeded { iterations });
                }
            }

            model = em::maximize(&model, z, &smoothed);
            iterations += 1;
            model.validate(iterations)?;
        };

        if !converged {
            match em.on_non_convergence {
                ConvergencePolicy::Fail => {
                    return Err(EstimationError::NotConverged {
                        iterations,
                        relative_change,
                    })
                }
                ConvergencePolicy::Warn => tracing::warn!(
                    iterations,
                    relative_change,
                    "kca em hit its iteration ceiling without converging"
                ),
            }
        }

        let mut means = smoothed.means;
        let mut covariances = smoothed.covariances;
        for _ in 0..self.config.forecast_steps {
            let (Some(x), Some(p)) = (means.last(), covariances.last()) else {
                break;
            };
            let (x, p) = model.predict(x, p);
            means.push(x);
            covariances.push(p);
        }

        for (t, p) in covariances.iter().enumerate() {
            for (i, component) in ["position", "velocity", "acceleration"].into_iter().enumerate() {
                let value = p[(i, i)];
                if !(value.is_finite() && value >= 0.0) {
                    return Err(EstimationError::InvalidVariance {
                        component,
                        step: t,
                        value,
                    });
                }
            }
        }

        let covariances: Vec<KinematicCovariance> =
            covariances.into_iter().map(KinematicCovariance::new).collect();
        let stdevs = covariances.iter().map(KinematicCovariance::stdevs).collect();
        let means = means.into_iter().map(KinematicState::from).collect();

        Ok(KineticFit {
            means,
            stdevs,
            covariances,
            diagnostics: FitDiagnostics {
                step,
                observed: n,
                forecast_steps: self.config.forecast_steps,
                iterations,
                converged,
                log_likelihood,
                model,
            },
        })
    }
}

/// `fit(series, seed, forecast_steps)` with default EM settings.
pub fn fit(series: &Series, noise_seed: f64, forecast_steps: usize) -> Result<KineticFit, EstimationError> {
    KineticEstimator::new(KineticConfig::new(noise_seed).with_forecast(forecast_steps)).fit(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{gaussian_noise, periodic};

    fn sine_series(n: usize) -> Series {
        let noise = gaussian_noise(n, 0.5, 7);
        let values = (0..n)
            .map(|i| (i as f64 * 0.1).sin() * 5.0 + 100.0 + noise[i])
            .collect();
        Series::from_values(values).unwrap()
    }

    #[test]
    fn output_lengths_include_forecast() {
        let fit = fit(&sine_series(80), 0.01, 7).unwrap();
        assert_eq!(fit.len(), 87);
        assert_eq!(fit.stdevs.len(), 87);
        assert_eq!(fit.covariances.len(), 87);
        assert_eq!(fit.observed().len(), 80);
        assert_eq!(fit.forecast().len(), 7);
    }

    #[test]
    fn stdevs_match_covariance_diagonal() {
        let fit = fit(&sine_series(50), 0.01, 2).unwrap();
        for (sd, cov) in fit.stdevs.iter().zip(&fit.covariances) {
            let [p, v, a] = cov.diagonal();
            assert_eq!(sd.position, p.sqrt());
            assert_eq!(sd.velocity, v.sqrt());
            assert_eq!(sd.acceleration, a.sqrt());
        }
    }

    #[test]
    fn too_few_points_is_rejected() {
        let s = Series::from_values(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            fit(&s, 0.1, 0).unwrap_err(),
            EstimationError::InsufficientData {
                required: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn non_positive_seed_is_rejected() {
        let s = sine_series(20);
        assert_eq!(fit(&s, 0.0, 0).unwrap_err(), EstimationError::InvalidNoiseSeed(0.0));
        assert!(matches!(
            fit(&s, -1.0, 0).unwrap_err(),
            EstimationError::InvalidNoiseSeed(_)
        ));
        assert!(matches!(
            fit(&s, f64::NAN, 0).unwrap_err(),
            EstimationError::InvalidNoiseSeed(_)
        ));
    }

    #[test]
    fn non_convergence_fails_under_strict_policy() {
        let em = EmSettings {
            max_iterations: 1,
            tolerance: 1e-12,
            on_non_convergence: ConvergencePolicy::Fail,
        };
        let estimator = KineticEstimator::new(KineticConfig::new(0.01).with_em(em));
        let err = estimator.fit(&sine_series(60)).unwrap_err();
        assert!(matches!(err, EstimationError::NotConverged { iterations: 1, .. }));
    }

    #[test]
    fn non_convergence_is_flagged_under_warn_policy() {
        let em = EmSettings {
            max_iterations: 1,
            tolerance: 1e-12,
            on_non_convergence: ConvergencePolicy::Warn,
        };
        let estimator = KineticEstimator::new(KineticConfig::new(0.01).with_em(em));
        let fit = estimator.fit(&sine_series(60)).unwrap();
        assert!(!fit.diagnostics.converged);
        assert_eq!(fit.diagnostics.iterations, 1);
    }

    #[test]
    fn past_deadline_aborts() {
        let estimator =
            KineticEstimator::new(KineticConfig::new(0.01)).with_deadline(Instant::now());
        let err = estimator.fit(&sine_series(60)).unwrap_err();
        assert_eq!(err, EstimationError::DeadlineExceeded { iterations: 0 });
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let em = EmSettings {
            max_iterations: 0,
            ..EmSettings::default()
        };
        let estimator = KineticEstimator::new(KineticConfig::new(0.01).with_em(em));
        assert!(matches!(
            estimator.fit(&sine_series(20)).unwrap_err(),
            EstimationError::InvalidSettings(_)
        ));
    }

    #[test]
    fn step_uses_endpoint_span_over_count() {
        let fit = fit(&sine_series(40), 0.01, 0).unwrap();
        assert!((fit.diagnostics.step - 39.0 / 40.0).abs() < 1e-15);
    }

    #[test]
    fn forecast_trace_is_non_decreasing() {
        let fit = fit(&sine_series(120), 0.01, 15).unwrap();
        let n = fit.diagnostics.observed;
        for k in n..fit.len() {
            assert!(
                fit.covariances[k].trace() >= fit.covariances[k - 1].trace(),
                "trace shrank at step {k}"
            );
        }
    }

    #[test]
    fn linear_trend_has_positive_velocity() {
        let noise = gaussian_noise(60, 0.1, 11);
        let values: Vec<f64> = (0..60).map(|i| 10.0 + 0.25 * i as f64 + noise[i]).collect();
        let fit = fit(&Series::from_values(values).unwrap(), 0.001, 0).unwrap();
        let v = fit.means[50].velocity;
        assert!(v > 0.2 && v < 0.3, "velocity {v}");
    }

    #[test]
    fn periodic_fit_denoises() {
        let data = periodic(10, 300, 0.5, 0);
        let series = Series::new(data.t.clone(), data.observed.clone()).unwrap();
        let fit = fit(&series, 0.001, 0).unwrap();
        let position = fit.positions();
        let corr = crate::stats::correlation(&position, &data.signal);
        assert!(corr > 0.9, "correlation {corr}");
    }
}
