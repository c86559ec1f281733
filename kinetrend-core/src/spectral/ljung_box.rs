//! Ljung–Box portmanteau test for residual autocorrelation.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Result of a whiteness test on a residual series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhitenessTest {
    /// `Q = n (n + 2) sum_k r_k^2 / (n - k)`
    pub statistic: f64,
    /// Upper tail of chi-squared with `lags` degrees of freedom.
    pub p_value: f64,
    pub lags: usize,
}

impl WhitenessTest {
    fn degenerate(lags: usize) -> Self {
        Self {
            statistic: 0.0,
            p_value: 1.0,
            lags,
        }
    }
}

/// Default lag count `floor(12 (n / 100)^(1/4))`, at most `n - 1`.
pub fn default_lags(n: usize) -> usize {
    let lags = (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize;
    lags.min(n.saturating_sub(1))
}

/// Ljung–Box statistic over lags `1..=lags`.
///
/// Autocorrelations use the demeaned series with the full-sample denominator.
/// A series with no usable lags or zero variance is reported as white
/// (statistic 0, p-value 1).
pub fn ljung_box(residual: &[f64], lags: usize) -> WhitenessTest {
    let n = residual.len();
    let lags = lags.min(n.saturating_sub(1));
    if lags == 0 {
        return WhitenessTest::degenerate(lags);
    }

    let mean = residual.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = residual.iter().map(|x| x - mean).collect();
    let denom: f64 = centered.iter().map(|x| x * x).sum();
    if denom.is_nan() || denom <= f64::MIN_POSITIVE {
        return WhitenessTest::degenerate(lags);
    }

    let nf = n as f64;
    let mut statistic = 0.0;
    for k in 1..=lags {
        let r: f64 = centered[k..]
            .iter()
            .zip(&centered[..n - k])
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / denom;
        statistic += r * r / (nf - k as f64);
    }
    statistic *= nf * (nf + 2.0);

    let p_value = ChiSquared::new(lags as f64)
        .map(|dist| dist.sf(statistic))
        .unwrap_or(1.0);
    WhitenessTest {
        statistic,
        p_value,
        lags,
    }
}
