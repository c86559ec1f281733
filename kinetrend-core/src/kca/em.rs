//! Closed-form M-step for the kinematic state-space model.
//!
//! Re-estimated: observation variance, transition covariance, initial state mean and
//! initial state covariance. The transition and observation matrices stay fixed.

use nalgebra::Matrix3;

use super::model::{symmetrize, StateSpaceModel};
use super::smoother::SmoothPass;

pub(crate) fn maximize(
    model: &StateSpaceModel,
    observations: &[f64],
    smoothed: &SmoothPass,
) -> StateSpaceModel {
    StateSpaceModel {
        transition: model.transition,
        transition_covariance: transition_covariance(model, smoothed),
        observation: model.observation,
        observation_variance: observation_variance(model, observations, smoothed),
        initial_mean: smoothed.means[0],
        initial_covariance: smoothed.covariances[0],
    }
}

/// R = 1/n * sum_t [ (z[t] - H x[t])^2 + H P[t] H' ]
fn observation_variance(model: &StateSpaceModel, observations: &[f64], smoothed: &SmoothPass) -> f64 {
    let h = model.observation;
    let total: f64 = observations
        .iter()
        .zip(smoothed.means.iter().zip(&smoothed.covariances))
        .map(|(&z, (x, p))| {
            let err = z - (h * x)[(0, 0)];
            err * err + (h * p * h.transpose())[(0, 0)]
        })
        .sum();
    total / observations.len() as f64
}

/// Q = 1/(n-1) * sum_t [ e e' + A P[t] A' + P[t+1] - V A' - A V' ]
/// where e = x[t+1] - A x[t] and V = Cov(x[t+1], x[t]).
fn transition_covariance(model: &StateSpaceModel, smoothed: &SmoothPass) -> Matrix3<f64> {
    let n = smoothed.means.len();
    if n < 2 {
        return model.transition_covariance;
    }
    let a = &model.transition;
    let mut total = Matrix3::zeros();
    for t in 0..n - 1 {
        let err = smoothed.means[t + 1] - a * smoothed.means[t];
        let v_at = smoothed.pairwise[t + 1] * a.transpose();
        total += err * err.transpose() + a * smoothed.covariances[t] * a.transpose()
            + smoothed.covariances[t + 1]
            - v_at
            - v_at.transpose();
    }
    symmetrize(&(total / (n - 1) as f64))
}
