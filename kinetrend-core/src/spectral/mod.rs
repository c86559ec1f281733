//! Greedy Fourier denoising.
//!
//! Frequencies are admitted one at a time. Each round tries every remaining DFT
//! component, keeps the one whose inclusion leaves the most white residual (smallest
//! Ljung–Box statistic), and repeats until the residual looks like noise or the gain
//! stalls. Used as an independent benchmark for the kinetic position estimate.

pub mod ljung_box;

use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Instant;
use thiserror::Error;

pub use ljung_box::{default_lags, ljung_box, WhitenessTest};

/// Statistics within this relative distance count as tied.
///
/// Conjugate bins `k` and `n - k` of a real series leave the same residual up to
/// rounding; the tie keeps the lower index.
const TIE_TOLERANCE: f64 = 1e-12;

fn improves_on(candidate: f64, best: f64) -> bool {
    best - candidate > TIE_TOLERANCE * best.abs()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("cannot select frequencies of an empty series")]
    Empty,

    #[error("significance level must lie in (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// Stop once the residual is white at this level, or once the statistic
    /// improves by less than this fraction. `None` admits every frequency.
    pub min_alpha: Option<f64>,
    pub max_components: Option<usize>,
}

impl SpectralConfig {
    pub fn with_min_alpha(alpha: f64) -> Self {
        Self {
            min_alpha: Some(alpha),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SelectionError> {
        match self.min_alpha {
            Some(a) if !(a > 0.0 && a < 1.0) => Err(SelectionError::InvalidAlpha(a)),
            _ => Ok(()),
        }
    }
}

/// Why selection stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every frequency was admitted.
    Exhausted,
    /// Residual p-value rose above `min_alpha`.
    Whitened,
    /// Relative improvement of the statistic fell under `min_alpha`.
    DiminishingReturns,
    MaxComponents,
    DeadlineExceeded,
}

/// One DFT coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub index: usize,
    pub re: f64,
    pub im: f64,
}

impl Component {
    fn new(index: usize, amplitude: Complex64) -> Self {
        Self {
            index,
            re: amplitude.re,
            im: amplitude.im,
        }
    }

    pub fn amplitude(&self) -> Complex64 {
        Complex64::new(self.re, self.im)
    }

    pub fn magnitude(&self) -> f64 {
        self.amplitude().norm()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralReconstruction {
    /// Inverse DFT of the admitted spectrum; same length as the input.
    pub series: Vec<f64>,
    /// In admission order.
    pub admitted: Vec<Component>,
    /// Not admitted, by ascending index.
    pub remaining: Vec<Component>,
    /// Whiteness of the residual after the last admission.
    pub whiteness: Option<WhitenessTest>,
    pub termination: Termination,
}

#[derive(Debug, Clone, Default)]
pub struct SpectralSelector {
    config: SpectralConfig,
    deadline: Option<Instant>,
}

impl SpectralSelector {
    pub fn new(config: SpectralConfig) -> Self {
        Self {
            config,
            deadline: None,
        }
    }

    /// Stop with [`Termination::DeadlineExceeded`] once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &SpectralConfig {
        &self.config
    }

    pub fn select(&self, series: &[f64]) -> Result<SpectralReconstruction, SelectionError> {
        self.config.validate()?;
        if series.is_empty() {
            return Err(SelectionError::Empty);
        }
        if let Some(index) = series.iter().position(|x| !x.is_finite()) {
            return Err(SelectionError::NonFinite { index });
        }

        let n = series.len();
        let mut planner = FftPlanner::<f64>::new();
        let mut spectrum: Vec<Complex64> = series.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        planner.plan_fft_forward(n).process(&mut spectrum);

        let twiddles: Vec<Complex64> = (0..n)
            .map(|j| Complex64::from_polar(1.0, 2.0 * PI * j as f64 / n as f64))
            .collect();
        // Real part of the inverse-DFT term of coefficient `k` at time `t`.
        let term = |k: usize, t: usize| (spectrum[k] * twiddles[(k * t) % n]).re / n as f64;

        let lags = default_lags(n);
        let mut available: Vec<usize> = (0..n).collect();
        let mut admitted = Vec::new();
        let mut residual = series.to_vec();
        let mut candidate = vec![0.0; n];
        let mut whiteness: Option<WhitenessTest> = None;

        let termination = loop {
            if available.is_empty() {
                break Termination::Exhausted;
            }
            if self.config.max_components.is_some_and(|max| admitted.len() >= max) {
                break Termination::MaxComponents;
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                break Termination::DeadlineExceeded;
            }

            let mut best: Option<(usize, WhitenessTest)> = None;
            for (slot, &k) in available.iter().enumerate() {
                for (t, c) in candidate.iter_mut().enumerate() {
                    *c = residual[t] - term(k, t);
                }
                let test = ljung_box(&candidate, lags);
                if best.map_or(true, |(_, b)| improves_on(test.statistic, b.statistic)) {
                    best = Some((slot, test));
                }
            }
            let Some((slot, test)) = best else {
                break Termination::Exhausted;
            };

            let k = available.remove(slot);
            for (t, r) in residual.iter_mut().enumerate() {
                *r -= term(k, t);
            }
            admitted.push(Component::new(k, spectrum[k]));
            let previous = whiteness.replace(test);
            tracing::debug!(
                index = k,
                statistic = test.statistic,
                p_value = test.p_value,
                admitted = admitted.len(),
                "spectral round"
            );

            if let Some(alpha) = self.config.min_alpha {
                if test.p_value > alpha {
                    break Termination::Whitened;
                }
                if let Some(prev) = previous.filter(|p| p.statistic > 0.0) {
                    if (prev.statistic - test.statistic) / prev.statistic < alpha {
                        break Termination::DiminishingReturns;
                    }
                }
            }
        };

        let mut kept = vec![Complex64::new(0.0, 0.0); n];
        for c in &admitted {
            kept[c.index] = c.amplitude();
        }
        planner.plan_fft_inverse(n).process(&mut kept);
        let reconstruction = kept.iter().map(|c| c.re / n as f64).collect();

        Ok(SpectralReconstruction {
            series: reconstruction,
            admitted,
            remaining: available
                .into_iter()
                .map(|k| Component::new(k, spectrum[k]))
                .collect(),
            whiteness,
            termination,
        })
    }
}

/// Greedy selection with an optional significance level and no other limits.
pub fn select(series: &[f64], min_alpha: Option<f64>) -> Result<SpectralReconstruction, SelectionError> {
    SpectralSelector::new(SpectralConfig {
        min_alpha,
        max_components: None,
    })
    .select(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::correlation;
    use crate::synthetic::periodic;

    #[test]
    fn empty_series_is_rejected() {
        assert_eq!(select(&[], None).unwrap_err(), SelectionError::Empty);
    }

    #[test]
    fn non_finite_sample_is_rejected() {
        assert_eq!(
            select(&[1.0, f64::NAN, 2.0], None).unwrap_err(),
            SelectionError::NonFinite { index: 1 }
        );
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        for alpha in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                select(&[1.0, 2.0], Some(alpha)).unwrap_err(),
                SelectionError::InvalidAlpha(_)
            ));
        }
    }

    #[test]
    fn admitting_everything_reproduces_input() {
        let data = periodic(3, 24, 0.3, 1);
        let out = select(&data.observed, None).unwrap();
        assert_eq!(out.termination, Termination::Exhausted);
        assert_eq!(out.admitted.len(), 24);
        assert!(out.remaining.is_empty());
        for (a, b) in out.series.iter().zip(&data.observed) {
            assert!((a - b).abs() < 1e-9, "{a} vs {b}");
        }
    }

    #[test]
    fn ties_go_to_lowest_index() {
        // Only the DC term is non-zero; every candidate leaves a constant residual.
        let out = select(&[2.0; 8], None).unwrap();
        let order: Vec<usize> = out.admitted.iter().map(|c| c.index).collect();
        assert_eq!(order, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn conjugate_bins_admit_lower_index_first() {
        let data = periodic(4, 64, 0.5, 3);
        let out = SpectralSelector::new(SpectralConfig {
            min_alpha: None,
            max_components: Some(2),
        })
        .select(&data.observed)
        .unwrap();
        let order: Vec<usize> = out.admitted.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![1, 63]);
    }

    #[test]
    fn near_equal_statistics_are_tied() {
        assert!(!improves_on(10.0 - 1e-14, 10.0));
        assert!(improves_on(9.9, 10.0));
        assert!(!improves_on(0.0, 0.0));
    }

    #[test]
    fn white_residual_stops_early() {
        let out = select(&[2.0; 8], Some(0.05)).unwrap();
        assert_eq!(out.termination, Termination::Whitened);
        assert_eq!(out.admitted.len(), 1);
        assert_eq!(out.remaining.len(), 7);
        assert!(out.series.iter().all(|x| (x - 2.0).abs() < 1e-12));
    }

    #[test]
    fn selection_is_deterministic() {
        let data = periodic(4, 64, 0.5, 3);
        let a = select(&data.observed, Some(0.05)).unwrap();
        let b = select(&data.observed, Some(0.05)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn max_components_caps_admissions() {
        let data = periodic(4, 64, 0.5, 3);
        let out = SpectralSelector::new(SpectralConfig {
            min_alpha: None,
            max_components: Some(2),
        })
        .select(&data.observed)
        .unwrap();
        assert_eq!(out.termination, Termination::MaxComponents);
        assert_eq!(out.admitted.len(), 2);
        assert_eq!(out.remaining.len(), 62);
    }

    #[test]
    fn past_deadline_admits_nothing() {
        let out = SpectralSelector::default()
            .with_deadline(Instant::now())
            .select(&[1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(out.termination, Termination::DeadlineExceeded);
        assert!(out.admitted.is_empty());
        assert!(out.whiteness.is_none());
        assert_eq!(out.series, vec![0.0; 3]);
    }

    #[test]
    fn noisy_sine_is_recovered_with_few_components() {
        let data = periodic(10, 300, 0.5, 0);
        let out = select(&data.observed, Some(0.05)).unwrap();
        assert!(out.admitted.len() < 30, "admitted {}", out.admitted.len());
        assert_eq!(out.series.len(), 300);
        let corr = correlation(&out.series, &data.signal);
        assert!(corr > 0.9, "correlation {corr}");
    }
}
