//! Trend classification from the signs of velocity and acceleration.
//!
//! | velocity | acceleration | label        |
//! |----------|--------------|--------------|
//! | +        | +            | Up           |
//! | -        | -            | Down         |
//! | -        | +            | ConvexUp     |
//! | +        | -            | ConvexDown   |
//!
//! Any component with magnitude `<= epsilon` (or NaN) has no sign, and the trend is
//! undefined (`None`). With the default `epsilon = 0.0` only exact zeros are undefined.

use serde::{Deserialize, Serialize};

use crate::domain::{KinematicState, TrendLabel};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendClassifier {
    /// Dead band around zero treated as "no sign".
    pub epsilon: f64,
}

impl TrendClassifier {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.abs(),
        }
    }

    pub fn classify(&self, velocity: f64, acceleration: f64) -> Option<TrendLabel> {
        match (self.sign(velocity), self.sign(acceleration)) {
            (1, 1) => Some(TrendLabel::Up),
            (-1, -1) => Some(TrendLabel::Down),
            (-1, 1) => Some(TrendLabel::ConvexUp),
            (1, -1) => Some(TrendLabel::ConvexDown),
            _ => None,
        }
    }

    pub fn classify_states(&self, states: &[KinematicState]) -> Vec<Option<TrendLabel>> {
        states
            .iter()
            .map(|s| self.classify(s.velocity, s.acceleration))
            .collect()
    }

    fn sign(&self, x: f64) -> i8 {
        if x.is_nan() || x.abs() <= self.epsilon {
            0
        } else if x > 0.0 {
            1
        } else {
            -1
        }
    }
}

/// Classify with no dead band.
pub fn classify(velocity: f64, acceleration: f64) -> Option<TrendLabel> {
    TrendClassifier::default().classify(velocity, acceleration)
}
