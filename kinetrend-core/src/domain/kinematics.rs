//! Kinematic state and its uncertainty.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Position, velocity and acceleration at one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KinematicState {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl KinematicState {
    pub fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.position, self.velocity, self.acceleration)
    }
}

impl From<Vector3<f64>> for KinematicState {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Posterior covariance of a [`KinematicState`].
///
/// Always symmetric; the estimator rejects any matrix with a negative or
/// non-finite diagonal before it is wrapped here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicCovariance(Matrix3<f64>);

impl KinematicCovariance {
    pub(crate) fn new(matrix: Matrix3<f64>) -> Self {
        Self(matrix)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn trace(&self) -> f64 {
        self.0.trace()
    }

    pub fn diagonal(&self) -> [f64; 3] {
        [self.0[(0, 0)], self.0[(1, 1)], self.0[(2, 2)]]
    }

    /// Marginal standard deviations of position, velocity and acceleration.
    pub fn stdevs(&self) -> KinematicState {
        let [p, v, a] = self.diagonal();
        KinematicState::new(p.sqrt(), v.sqrt(), a.sqrt())
    }
}
