//! From kinematics to trading decisions.
//!
//! [`classifier`] labels each step by the signs of velocity and acceleration;
//! [`engine`] confirms labels over a lookback window and tracks the single open
//! position of an instrument.

pub mod classifier;
pub mod engine;

pub use classifier::{classify, TrendClassifier};
pub use engine::{
    ClassificationError, Decision, EngineError, InstrumentState, Lookback, SignalPositionEngine,
    SignalTrack, StateError,
};
