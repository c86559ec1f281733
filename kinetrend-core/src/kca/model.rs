//! Linear-Gaussian state-space model for constant-acceleration kinematics.
//!
//! State:       x[t+1] = A x[t] + w,  w ~ N(0, Q)
//! Observation: z[t]   = H x[t] + v,  v ~ N(0, R)
//!
//! with `H = [1, 0, 0]` (only position is observed) and `x[0] ~ N(mu0, P0)`.

use nalgebra::{Cholesky, Matrix3, RowVector3, Vector3};
use serde::{Deserialize, Serialize};

use super::EstimationError;

/// Parameters of the kinematic state-space model.
///
/// `transition` is fixed by the time step; EM re-estimates the noise terms and the
/// initial state distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpaceModel {
    pub transition: Matrix3<f64>,
    pub transition_covariance: Matrix3<f64>,
    pub observation: RowVector3<f64>,
    pub observation_variance: f64,
    pub initial_mean: Vector3<f64>,
    pub initial_covariance: Matrix3<f64>,
}

impl StateSpaceModel {
    /// Seed model: `Q = seed * I`, `R = 1`, `mu0 = 0`, `P0 = I`.
    pub fn kinematic(step: f64, noise_seed: f64) -> Self {
        Self {
            transition: transition_matrix(step),
            transition_covariance: Matrix3::identity() * noise_seed,
            observation: RowVector3::new(1.0, 0.0, 0.0),
            observation_variance: 1.0,
            initial_mean: Vector3::zeros(),
            initial_covariance: Matrix3::identity(),
        }
    }

    /// One-step prediction with no observation.
    pub fn predict(&self, mean: &Vector3<f64>, cov: &Matrix3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
        let a = &self.transition;
        let mean = a * mean;
        let cov = symmetrize(&(a * cov * a.transpose() + self.transition_covariance));
        (mean, cov)
    }

    /// Reject parameter sets EM must never hand back to the filter.
    pub(crate) fn validate(&self, iteration: usize) -> Result<(), EstimationError> {
        if !(self.observation_variance.is_finite() && self.observation_variance > 0.0) {
            return Err(EstimationError::NotPositiveDefinite {
                what: "observation variance",
                step: iteration,
            });
        }
        if Cholesky::new(self.transition_covariance).is_none() {
            return Err(EstimationError::NotPositiveDefinite {
                what: "transition covariance",
                step: iteration,
            });
        }
        if Cholesky::new(self.initial_covariance).is_none() {
            return Err(EstimationError::NotPositiveDefinite {
                what: "initial state covariance",
                step: iteration,
            });
        }
        Ok(())
    }
}

/// Exact constant-acceleration kinematics over a step of length `h`.
pub fn transition_matrix(h: f64) -> Matrix3<f64> {
    Matrix3::new(
        1.0, h, 0.5 * h * h, //
        0.0, 1.0, h, //
        0.0, 0.0, 1.0,
    )
}

pub(crate) fn symmetrize(m: &Matrix3<f64>) -> Matrix3<f64> {
    (m + m.transpose()) * 0.5
}
