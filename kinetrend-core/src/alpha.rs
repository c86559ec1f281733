//! Alpha strategies on top of kinetic components.
//!
//! Both strategies compare the smoothed position with the observed price and gate on
//! the rolling mean of acceleration against quantiles of the raw acceleration:
//!
//! | strategy       | -1 when                           | +1 when                           |
//! |----------------|-----------------------------------|-----------------------------------|
//! | momentum       | pos < price, macc < q(t)          | pos > price, macc > q(1 - t)      |
//! | mean reversion | pos > price, macc < q(1 - t)      | pos < price, macc > q(t)          |
//!
//! Steps whose rolling mean is still warming up get 0.

use serde::{Deserialize, Serialize};

use crate::domain::KinematicState;
use crate::stats::{quantile, rolling_mean};

/// Produces a -1/0/+1 exposure per step from prices and their kinematics.
pub trait AlphaStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// `prices` and `states` are aligned; output has the length of the shorter one.
    fn signal(&self, prices: &[f64], states: &[KinematicState]) -> Vec<i8>;

    /// `|signal[t] - signal[t-1]|`, 0 at the first step.
    fn trades(&self, prices: &[f64], states: &[KinematicState]) -> Vec<u8> {
        trades(&self.signal(prices, states))
    }
}

pub fn trades(signal: &[i8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(signal.len());
    let mut prev = signal.first().copied().unwrap_or(0);
    for &s in signal {
        out.push((s - prev).unsigned_abs());
        prev = s;
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KcaMomentum {
    /// Rolling-mean window for acceleration.
    pub window: usize,
    /// Quantile in `[0, 1]`; 0.5 admits every signal.
    pub threshold: f64,
}

impl Default for KcaMomentum {
    fn default() -> Self {
        Self {
            window: 5,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KcaMeanReversion {
    pub window: usize,
    pub threshold: f64,
}

impl Default for KcaMeanReversion {
    fn default() -> Self {
        Self {
            window: 5,
            threshold: 0.5,
        }
    }
}

struct Bands {
    macc: Vec<f64>,
    low: f64,
    high: f64,
}

impl Bands {
    fn new(states: &[KinematicState], window: usize, threshold: f64) -> Self {
        let acc: Vec<f64> = states.iter().map(|s| s.acceleration).collect();
        Self {
            macc: rolling_mean(&acc, window),
            low: quantile(&acc, threshold).unwrap_or(f64::NAN),
            high: quantile(&acc, 1.0 - threshold).unwrap_or(f64::NAN),
        }
    }
}

// NaN comparisons are false, so warm-up steps and empty quantiles fall through to 0.
fn select_signal(
    prices: &[f64],
    states: &[KinematicState],
    bands: &Bands,
    short: impl Fn(f64, f64) -> bool,
    long: impl Fn(f64, f64) -> bool,
) -> Vec<i8> {
    prices
        .iter()
        .zip(states)
        .zip(&bands.macc)
        .map(|((&price, state), &macc)| {
            if short(state.position - price, macc) {
                -1
            } else if long(state.position - price, macc) {
                1
            } else {
                0
            }
        })
        .collect()
}

impl AlphaStrategy for KcaMomentum {
    fn name(&self) -> &str {
        "kca_momentum"
    }

    fn signal(&self, prices: &[f64], states: &[KinematicState]) -> Vec<i8> {
        let bands = Bands::new(states, self.window, self.threshold);
        let (low, high) = (bands.low, bands.high);
        select_signal(
            prices,
            states,
            &bands,
            |gap, macc| gap < 0.0 && macc < low,
            |gap, macc| gap > 0.0 && macc > high,
        )
    }
}

impl AlphaStrategy for KcaMeanReversion {
    fn name(&self) -> &str {
        "kca_mean_reversion"
    }

    fn signal(&self, prices: &[f64], states: &[KinematicState]) -> Vec<i8> {
        let bands = Bands::new(states, self.window, self.threshold);
        let (low, high) = (bands.low, bands.high);
        select_signal(
            prices,
            states,
            &bands,
            |gap, macc| gap > 0.0 && macc < high,
            |gap, macc| gap < 0.0 && macc > low,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(positions: &[f64], accelerations: &[f64]) -> Vec<KinematicState> {
        positions
            .iter()
            .zip(accelerations)
            .map(|(&p, &a)| KinematicState::new(p, 0.0, a))
            .collect()
    }

    #[test]
    fn trades_count_signal_changes() {
        assert_eq!(trades(&[0, 1, 1, -1, 0]), vec![0, 1, 0, 2, 1]);
        assert!(trades(&[]).is_empty());
    }

    #[test]
    fn momentum_follows_rising_acceleration_above_price() {
        let prices = [10.0; 6];
        let acc = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let s = states(&[11.0; 6], &acc);
        let strategy = KcaMomentum {
            window: 2,
            threshold: 0.5,
        };
        // median 0.5; macc = [NaN, -1.5, -0.5, 0.5, 1.5, 2.5]
        assert_eq!(strategy.signal(&prices, &s), vec![0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn momentum_shorts_falling_acceleration_below_price() {
        let prices = [10.0; 6];
        let acc = [3.0, 2.0, 1.0, 0.0, -1.0, -2.0];
        let s = states(&[9.0; 6], &acc);
        let strategy = KcaMomentum {
            window: 2,
            threshold: 0.5,
        };
        assert_eq!(strategy.signal(&prices, &s), vec![0, 0, 0, 0, -1, -1]);
    }

    #[test]
    fn mean_reversion_fades_position_above_price() {
        let prices = [10.0; 6];
        let acc = [3.0, 2.0, 1.0, 0.0, -1.0, -2.0];
        let s = states(&[11.0; 6], &acc);
        let strategy = KcaMeanReversion {
            window: 2,
            threshold: 0.5,
        };
        assert_eq!(strategy.signal(&prices, &s), vec![0, 0, 0, 0, -1, -1]);
    }

    #[test]
    fn mean_reversion_buys_position_below_price() {
        let prices = [10.0; 6];
        let acc = [-2.0, -1.0, 0.0, 1.0, 2.0, 3.0];
        let s = states(&[9.0; 6], &acc);
        let strategy = KcaMeanReversion::default();
        // window 5: rolling means 0.0 and 1.0 at the last two steps, median 0.5
        assert_eq!(strategy.signal(&prices, &s), vec![0, 0, 0, 0, 0, 1]);
        assert_eq!(strategy.trades(&prices, &s), vec![0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn warm_up_is_flat() {
        let strategy = KcaMomentum::default();
        let s = states(&[20.0; 4], &[1.0; 4]);
        assert_eq!(strategy.signal(&[10.0; 4], &s), vec![0; 4]);
    }

    #[test]
    fn strategies_have_distinct_names() {
        assert_ne!(KcaMomentum::default().name(), KcaMeanReversion::default().name());
    }
}
