//! Series — the time-indexed scalar input to every core procedure.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures when building a [`Series`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("series is empty")]
    Empty,

    #[error("time index has {times} entries but series has {values} values")]
    LengthMismatch { times: usize, values: usize },

    #[error("time index is not strictly increasing at position {index}")]
    NotIncreasing { index: usize },

    #[error("non-finite time at position {index}")]
    NonFiniteTime { index: usize },

    #[error("non-finite value at position {index}")]
    NonFiniteValue { index: usize },
}

/// An ordered sequence of `(time, value)` observations.
///
/// Times are strictly increasing and finite; values are finite. Uniform spacing is
/// not enforced, but the kinematic model derives a single step from the endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Series {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Result<Self, SeriesError> {
        if values.is_empty() {
            return Err(SeriesError::Empty);
        }
        if times.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        for (i, t) in times.iter().enumerate() {
            if !t.is_finite() {
                return Err(SeriesError::NonFiniteTime { index: i });
            }
            if i > 0 && *t <= times[i - 1] {
                return Err(SeriesError::NotIncreasing { index: i });
            }
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeriesError::NonFiniteValue { index });
        }
        Ok(Self { times, values })
    }

    /// Index-timed series: `t = 0, 1, ..., n-1`.
    pub fn from_values(values: Vec<f64>) -> Result<Self, SeriesError> {
        let times = (0..values.len()).map(|i| i as f64).collect();
        Self::new(times, values)
    }

    /// Dated observations, timed in days since the first date.
    ///
    /// Callers must deliver the observations sorted ascending with no duplicate dates.
    pub fn from_dated(observations: &[(NaiveDate, f64)]) -> Result<Self, SeriesError> {
        let Some((origin, _)) = observations.first() else {
            return Err(SeriesError::Empty);
        };
        let times = observations
            .iter()
            .map(|(date, _)| (*date - *origin).num_days() as f64)
            .collect();
        let values = observations.iter().map(|(_, v)| *v).collect();
        Self::new(times, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_time(&self) -> f64 {
        self.times[0]
    }

    pub fn last_time(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    pub fn last_value(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Trailing sub-series `[start, end)`, keeping the original time stamps.
    pub fn slice(&self, start: usize, end: usize) -> Result<Self, SeriesError> {
        let end = end.min(self.len());
        let start = start.min(end);
        Self::new(
            self.times[start..end].to_vec(),
            self.values[start..end].to_vec(),
        )
    }
}
