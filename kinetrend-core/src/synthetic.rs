//! Deterministic synthetic series for demos, tests and benchmarks.
//!
//! Noise is drawn from a seeded `StdRng`, so the same seed always produces the same
//! path regardless of platform or thread count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A noisy periodic signal and its noiseless source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicSample {
    /// Evenly spaced times over `[0, pi * periods / 2]`.
    pub t: Vec<f64>,
    /// `sin(t)`
    pub signal: Vec<f64>,
    /// `sin(t) + scale * N(0, 1)`
    pub observed: Vec<f64>,
}

/// `nobs` points of `sin(t)` over `t in [0, pi * periods / 2]` plus Gaussian noise.
pub fn periodic(periods: usize, nobs: usize, scale: f64, seed: u64) -> PeriodicSample {
    let end = PI * periods as f64 / 2.0;
    let t: Vec<f64> = match nobs {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..nobs)
            .map(|i| end * i as f64 / (nobs - 1) as f64)
            .collect(),
    };
    let signal: Vec<f64> = t.iter().map(|x| x.sin()).collect();
    let noise = gaussian_noise(nobs, scale, seed);
    let observed = signal.iter().zip(&noise).map(|(s, e)| s + e).collect();
    PeriodicSample {
        t,
        signal,
        observed,
    }
}

/// `n` draws of `scale * N(0, 1)`.
pub fn gaussian_noise(n: usize, scale: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| scale * standard_normal(&mut rng)).collect()
}

/// Geometric random walk `p[t] = p[t-1] * exp(drift + vol * N(0, 1))`.
pub fn random_walk(n: usize, start: f64, drift: f64, vol: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = start;
    (0..n)
        .map(|i| {
            if i > 0 {
                price *= (drift + vol * standard_normal(&mut rng)).exp();
            }
            price
        })
        .collect()
}

// Box-Muller transform
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
