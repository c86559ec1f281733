//! KineTrend Core — kinetic component analysis and the trading logic built on it.
//!
//! - Observation series and kinematic domain types
//! - Kinetic Component Analysis: EM-fitted constant-acceleration smoother with forecasts
//! - Greedy Fourier frequency selection with a Ljung–Box stopping rule
//! - Trend classification and the per-instrument signal/position state machine
//! - KCA alpha strategies and one-step forecast signals
//! - Deterministic synthetic data
//!
//! Everything here is pure computation; loading, orchestration and reporting live in
//! `kinetrend-runner`.

pub mod alpha;
pub mod domain;
pub mod forecast;
pub mod kca;
pub mod signals;
pub mod spectral;
pub mod stats;
pub mod synthetic;

pub use domain::{
    KinematicCovariance, KinematicState, PositionState, Series, SeriesError, Signal, TrendLabel,
};
pub use kca::{EstimationError, KineticConfig, KineticEstimator, KineticFit};
pub use signals::{classify, EngineError, Lookback, SignalPositionEngine, SignalTrack, TrendClassifier};
pub use spectral::{SelectionError, SpectralConfig, SpectralReconstruction, SpectralSelector};
