//! Kalman filter, Rauch–Tung–Striebel smoother and lag-one pairwise covariances.
//!
//! The observation is scalar, so the innovation variance is a plain `f64` and the
//! gain is a single column. The filter uses the Joseph form to keep covariances
//! symmetric positive semi-definite.

use nalgebra::{Cholesky, Matrix3, Vector3};
use std::f64::consts::PI;

use super::model::{symmetrize, StateSpaceModel};
use super::EstimationError;

/// Output of the forward pass.
#[derive(Debug, Clone)]
pub(crate) struct FilterPass {
    pub predicted_means: Vec<Vector3<f64>>,
    pub predicted_covariances: Vec<Matrix3<f64>>,
    pub filtered_means: Vec<Vector3<f64>>,
    pub filtered_covariances: Vec<Matrix3<f64>>,
    pub log_likelihood: f64,
}

/// Output of the backward pass.
///
/// `pairwise[t]` is `Cov(x[t], x[t-1] | z[0..n])`; `pairwise[0]` is unused and zero.
#[derive(Debug, Clone)]
pub(crate) struct SmoothPass {
    pub means: Vec<Vector3<f64>>,
    pub covariances: Vec<Matrix3<f64>>,
    pub pairwise: Vec<Matrix3<f64>>,
}

pub(crate) fn filter(
    model: &StateSpaceModel,
    observations: &[f64],
) -> Result<FilterPass, EstimationError> {
    let n = observations.len();
    let mut pass = FilterPass {
        predicted_means: Vec::with_capacity(n),
        predicted_covariances: Vec::with_capacity(n),
        filtered_means: Vec::with_capacity(n),
        filtered_covariances: Vec::with_capacity(n),
        log_likelihood: 0.0,
    };
    let h = model.observation;
    let r = model.observation_variance;

    for (t, &z) in observations.iter().enumerate() {
        let (x_pred, p_pred) = if t == 0 {
            (model.initial_mean, model.initial_covariance)
        } else {
            model.predict(&pass.filtered_means[t - 1], &pass.filtered_covariances[t - 1])
        };

        let s = (h * p_pred * h.transpose())[(0, 0)] + r;
        if !(s.is_finite() && s > 0.0) {
            return Err(EstimationError::NotPositiveDefinite {
                what: "innovation variance",
                step: t,
            });
        }
        let gain: Vector3<f64> = p_pred * h.transpose() / s;
        let innovation = z - (h * x_pred)[(0, 0)];

        let x_filt = x_pred + gain * innovation;
        let i_kh = Matrix3::identity() - gain * h;
        let p_filt = symmetrize(
            &(i_kh * p_pred * i_kh.transpose() + gain * gain.transpose() * r),
        );

        pass.log_likelihood -= 0.5 * ((2.0 * PI * s).ln() + innovation * innovation / s);
        pass.predicted_means.push(x_pred);
        pass.predicted_covariances.push(p_pred);
        pass.filtered_means.push(x_filt);
        pass.filtered_covariances.push(p_filt);
    }

    Ok(pass)
}

pub(crate) fn smooth(
    model: &StateSpaceModel,
    filtered: &FilterPass,
) -> Result<SmoothPass, EstimationError> {
    let n = filtered.filtered_means.len();
    let a = &model.transition;

    let mut means = filtered.filtered_means.clone();
    let mut covariances = filtered.filtered_covariances.clone();
    let mut gains = vec![Matrix3::zeros(); n];

    for t in (0..n.saturating_sub(1)).rev() {
        let p_pred_next = filtered.predicted_covariances[t + 1];
        let chol = Cholesky::new(p_pred_next).ok_or(EstimationError::NotPositiveDefinite {
            what: "predicted state covariance",
            step: t + 1,
        })?;
        // J = P[t|t] A' P[t+1|t]^-1, solved as J' = P[t+1|t]^-1 (A P[t|t]).
        let j = chol.solve(&(a * filtered.filtered_covariances[t])).transpose();

        means[t] = filtered.filtered_means[t] + j * (means[t + 1] - filtered.predicted_means[t + 1]);
        covariances[t] = symmetrize(
            &(filtered.filtered_covariances[t] + j * (covariances[t + 1] - p_pred_next) * j.transpose()),
        );
        gains[t] = j;
    }

    let mut pairwise = vec![Matrix3::zeros(); n];
    for t in 1..n {
        pairwise[t] = covariances[t] * gains[t - 1].transpose();
    }

    Ok(SmoothPass {
        means,
        covariances,
        pairwise,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 2.0 + 0.5 * i as f64).collect()
    }

    #[test]
    fn filter_lengths_match_observations() {
        let model = StateSpaceModel::kinematic(1.0, 0.01);
        let pass = filter(&model, &ramp(20)).unwrap();
        assert_eq!(pass.filtered_means.len(), 20);
        assert_eq!(pass.predicted_covariances.len(), 20);
        assert!(pass.log_likelihood.is_finite());
    }

    #[test]
    fn last_smoothed_equals_last_filtered() {
        let model = StateSpaceModel::kinematic(1.0, 0.01);
        let f = filter(&model, &ramp(15)).unwrap();
        let s = smooth(&model, &f).unwrap();
        assert_eq!(s.means[14], f.filtered_means[14]);
        assert_eq!(s.covariances[14], f.filtered_covariances[14]);
    }

    #[test]
    fn smoothing_does_not_increase_position_variance() {
        let model = StateSpaceModel::kinematic(1.0, 0.01);
        let f = filter(&model, &ramp(30)).unwrap();
        let s = smooth(&model, &f).unwrap();
        for t in 0..30 {
            assert!(s.covariances[t][(0, 0)] <= f.filtered_covariances[t][(0, 0)] + 1e-12);
        }
    }

    #[test]
    fn ramp_velocity_is_recovered() {
        let model = StateSpaceModel::kinematic(1.0, 1e-4);
        let f = filter(&model, &ramp(60)).unwrap();
        let s = smooth(&model, &f).unwrap();
        let v = s.means[40][1];
        assert!((v - 0.5).abs() < 0.05, "velocity {v}");
    }

    #[test]
    fn single_observation_has_no_pairwise_terms() {
        let model = StateSpaceModel::kinematic(1.0, 0.01);
        let f = filter(&model, &[3.0]).unwrap();
        let s = smooth(&model, &f).unwrap();
        assert_eq!(s.pairwise.len(), 1);
        assert_eq!(s.pairwise[0], Matrix3::zeros());
    }
}
