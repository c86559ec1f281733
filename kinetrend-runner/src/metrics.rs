//! Performance metrics: pure functions over prices and an exposure series.
//!
//! Every rolling series keeps the input length; the first `window - 1` entries are 0.
//! No dependencies on the data layer or the signal engine.

use serde::{Deserialize, Serialize};

use kinetrend_core::stats::{mean, std_dev};

/// Trading days per year, used for full-sample annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Per-step series derived from prices and exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSeries {
    pub window: usize,
    pub returns: Vec<f64>,
    pub pnl: Vec<f64>,
    pub cumulative: Vec<f64>,
    pub rolling_pnl: Vec<f64>,
    pub rolling_returns: Vec<f64>,
    pub rolling_volatility: Vec<f64>,
    pub rolling_sharpe: Vec<f64>,
}

impl PerformanceSeries {
    /// `weights` are aligned with `prices`; missing trailing weights count as 0.
    pub fn compute(prices: &[f64], weights: &[f64], window: usize) -> Self {
        let returns = log_returns(prices);
        let pnl = pnl(&returns, weights);
        let rolling_pnl = rolling_pnl(&pnl, window);
        let rolling_volatility = rolling_volatility(&pnl, window);
        Self {
            window,
            cumulative: cumulative_pnl(&pnl),
            rolling_returns: rolling_returns(&returns, window),
            rolling_sharpe: rolling_sharpe(&rolling_pnl, &rolling_volatility),
            returns,
            pnl,
            rolling_pnl,
            rolling_volatility,
        }
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Summary scalars for a single instrument run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Compounded P&L at the last step.
    pub total_pnl: f64,
    /// Full-sample annualized Sharpe of per-step P&L.
    pub sharpe: f64,
    /// Last value of the rolling Sharpe series.
    pub final_rolling_sharpe: f64,
    /// Full-sample annualized volatility of per-step P&L.
    pub volatility: f64,
    pub max_drawdown: f64,
    /// Fraction of steps with non-zero exposure.
    pub time_in_market: f64,
    /// Fraction of exposed steps whose return moved in the exposure's direction.
    pub hit_rate: f64,
    pub trade_count: usize,
}

impl PerformanceMetrics {
    pub fn compute(series: &PerformanceSeries, weights: &[f64], trade_count: usize) -> Self {
        let equity: Vec<f64> = series.cumulative.iter().map(|c| 1.0 + c).collect();
        Self {
            total_pnl: series.cumulative.last().copied().unwrap_or(0.0),
            sharpe: sharpe_ratio(&series.pnl),
            final_rolling_sharpe: series.rolling_sharpe.last().copied().unwrap_or(0.0),
            volatility: std_dev(&series.pnl) * TRADING_DAYS.sqrt(),
            max_drawdown: max_drawdown(&equity),
            time_in_market: time_in_market(weights),
            hit_rate: hit_rate(&series.returns, weights),
            trade_count,
        }
    }
}

// ─── Per-step series ────────────────────────────────────────────────

/// `ln(p[t] / p[t-1])`, 0 at the first step and wherever the ratio is not finite.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return out;
    }
    out.push(0.0);
    for w in prices.windows(2) {
        let r = (w[1] / w[0]).ln();
        out.push(if r.is_finite() { r } else { 0.0 });
    }
    out
}

/// `sign(return)` per step.
pub fn return_sign(returns: &[f64]) -> Vec<i8> {
    returns
        .iter()
        .map(|&r| {
            if r > 0.0 {
                1
            } else if r < 0.0 {
                -1
            } else {
                0
            }
        })
        .collect()
}

/// `return × weight` per step.
pub fn pnl(returns: &[f64], weights: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .enumerate()
        .map(|(i, r)| r * weights.get(i).copied().unwrap_or(0.0))
        .collect()
}

/// Compounded `∏(1 + pnl) − 1` up to each step.
pub fn cumulative_pnl(pnl: &[f64]) -> Vec<f64> {
    let mut growth = 1.0;
    pnl.iter()
        .map(|p| {
            growth *= 1.0 + p;
            growth - 1.0
        })
        .collect()
}

/// Rolling mean of P&L scaled by the window.
pub fn rolling_pnl(pnl: &[f64], window: usize) -> Vec<f64> {
    rolling(pnl, window, |w| mean(w) * window as f64)
}

/// Rolling compounded return `∏(1 + r) − 1`.
pub fn rolling_returns(returns: &[f64], window: usize) -> Vec<f64> {
    rolling(returns, window, |w| w.iter().map(|r| 1.0 + r).product::<f64>() - 1.0)
}

/// Rolling sample standard deviation of P&L scaled by `√window`.
pub fn rolling_volatility(pnl: &[f64], window: usize) -> Vec<f64> {
    rolling(pnl, window, |w| std_dev(w) * (window as f64).sqrt())
}

/// `rolling_pnl / rolling_volatility`, 0 where volatility is effectively zero.
pub fn rolling_sharpe(rolling_pnl: &[f64], rolling_volatility: &[f64]) -> Vec<f64> {
    rolling_pnl
        .iter()
        .zip(rolling_volatility)
        .map(|(p, v)| if *v < 1e-15 { 0.0 } else { p / v })
        .collect()
}

fn rolling(values: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (end, slot) in out.iter_mut().enumerate().skip(window - 1) {
        *slot = f(&values[end + 1 - window..=end]);
    }
    out
}

// ─── Scalars ────────────────────────────────────────────────────────

/// Annualized Sharpe ratio of per-step P&L.
///
/// Sharpe = mean(pnl) / std(pnl) * sqrt(252). Returns 0.0 if variance is zero or
/// fewer than 2 steps.
pub fn sharpe_ratio(pnl: &[f64]) -> f64 {
    if pnl.len() < 2 {
        return 0.0;
    }
    let std = std_dev(pnl);
    if std < 1e-15 {
        return 0.0;
    }
    (mean(pnl) / std) * TRADING_DAYS.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.len() < 2 {
        return 0.0;
    }
    let mut peak = equity_curve[0];
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

pub fn time_in_market(weights: &[f64]) -> f64 {
    if weights.is_empty() {
        return 0.0;
    }
    weights.iter().filter(|w| **w != 0.0).count() as f64 / weights.len() as f64
}

/// Share of exposed steps where `sign(weight) == sign(return)`; 0.0 when never exposed.
pub fn hit_rate(returns: &[f64], weights: &[f64]) -> f64 {
    let signs = return_sign(returns);
    let (exposed, hits) = signs
        .iter()
        .zip(weights)
        .filter(|(_, w)| **w != 0.0)
        .fold((0usize, 0usize), |(exposed, hits), (s, w)| {
            let direction = if *w > 0.0 { 1 } else { -1 };
            (exposed + 1, hits + usize::from(*s == direction))
        });
    if exposed == 0 {
        return 0.0;
    }
    hits as f64 / exposed as f64
}
