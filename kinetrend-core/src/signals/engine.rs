//! Signal/position state machine for a single instrument.
//!
//! A trend is confirmed when the `lookback` labels strictly before the current step
//! are all identical. A confirmed trend maps to a candidate signal:
//!
//! - **Flat**: the candidate is emitted and a position opens (`Held`).
//! - **Held**, candidate equals the signal that was last issued: nothing happens.
//! - **Held**, candidate differs: the candidate is emitted and the position closes.
//!
//! Unconfirmed steps emit `Signal::None` and carry the position forward, so at most
//! one position is ever open.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PositionState, Signal, TrendLabel};

/// A confirmation window whose labels agree on "no trend".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("lookback window ending before index {index} unanimously has an undefined trend")]
    UndefinedTrend { index: usize },
}

/// The position history broke single-open-position discipline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("position held at index {index} but no signal was ever issued")]
    HeldWithoutSignal { index: usize },

    #[error("signal at index {index} opened a position while one was already held")]
    DoubleOpen { index: usize },

    #[error("signal at index {index} closed a position while flat")]
    CloseWhileFlat { index: usize },

    #[error("position changed at index {index} without an issued signal")]
    SilentTransition { index: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid lookback: {0}")]
    InvalidLookback(String),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Confirmation window length, as a step count or as a calendar span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Steps(usize),
    /// Resolved to whole days, one step per day.
    Span(Duration),
}

impl Lookback {
    pub fn steps(&self) -> Result<usize, EngineError> {
        let steps = match *self {
            Lookback::Steps(n) => n,
            Lookback::Span(span) => {
                let days = span.num_days();
                if days < 0 {
                    return Err(EngineError::InvalidLookback(format!(
                        "span must be positive, got {days} days"
                    )));
                }
                days as usize
            }
        };
        if steps == 0 {
            return Err(EngineError::InvalidLookback("must be at least one step".into()));
        }
        Ok(steps)
    }
}

impl From<usize> for Lookback {
    fn from(steps: usize) -> Self {
        Lookback::Steps(steps)
    }
}

/// One post-warm-up step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub index: usize,
    /// The unanimous label of the window, if the window agreed.
    pub confirmed: Option<TrendLabel>,
    pub signal: Signal,
    /// Position after this step's signal.
    pub position: PositionState,
}

/// Mutable per-instrument state; advanced one window at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstrumentState {
    position: PositionState,
    last_issued: Option<Signal>,
}

impl InstrumentState {
    pub fn position(&self) -> PositionState {
        self.position
    }

    pub fn last_issued(&self) -> Option<Signal> {
        self.last_issued
    }

    /// Consume the window of labels preceding `index` and decide.
    pub fn step(
        &mut self,
        index: usize,
        window: &[Option<TrendLabel>],
    ) -> Result<Decision, EngineError> {
        let Some((first, rest)) = window.split_first() else {
            return Err(EngineError::InvalidLookback("empty confirmation window".into()));
        };
        let unanimous = rest.iter().all(|t| t == first);

        if !unanimous {
            return Ok(self.unconfirmed(index));
        }
        let Some(trend) = *first else {
            return Err(ClassificationError::UndefinedTrend { index }.into());
        };

        let candidate = trend.signal();
        let signal = match self.position {
            PositionState::Flat => candidate,
            PositionState::Held => match self.last_issued {
                None => return Err(StateError::HeldWithoutSignal { index }.into()),
                Some(last) if last == candidate => Signal::None,
                Some(_) => candidate,
            },
        };

        if signal.is_issued() {
            self.position = self.position.switched();
            self.last_issued = Some(signal);
        }
        Ok(Decision {
            index,
            confirmed: Some(trend),
            signal,
            position: self.position,
        })
    }

    fn unconfirmed(&self, index: usize) -> Decision {
        Decision {
            index,
            confirmed: None,
            signal: Signal::None,
            position: self.position,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPositionEngine {
    lookback: usize,
}

impl SignalPositionEngine {
    pub fn new(lookback: impl Into<Lookback>) -> Result<Self, EngineError> {
        Ok(Self {
            lookback: lookback.into().steps()?,
        })
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Walk the whole trend sequence; series shorter than `lookback + 1` yield no decisions.
    pub fn run(&self, trends: &[Option<TrendLabel>]) -> Result<SignalTrack, EngineError> {
        let mut state = InstrumentState::default();
        let mut decisions = Vec::with_capacity(trends.len().saturating_sub(self.lookback));
        for index in self.lookback..trends.len() {
            let decision = state.step(index, &trends[index - self.lookback..index])?;
            if decision.signal.is_issued() {
                tracing::trace!(index, signal = ?decision.signal, position = ?decision.position, "signal issued");
            }
            decisions.push(decision);
        }
        Ok(SignalTrack {
            lookback: self.lookback,
            len: trends.len(),
            decisions,
        })
    }
}

/// Decisions for one instrument, in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTrack {
    pub lookback: usize,
    /// Length of the trend sequence the track was built from.
    pub len: usize,
    pub decisions: Vec<Decision>,
}

impl SignalTrack {
    /// One signal per input step; warm-up steps are `Signal::None`.
    pub fn signals(&self) -> Vec<Signal> {
        let mut out = vec![Signal::None; self.len];
        for d in &self.decisions {
            if let Some(slot) = out.get_mut(d.index) {
                *slot = d.signal;
            }
        }
        out
    }

    /// One position per input step; warm-up steps are `Flat`.
    pub fn positions(&self) -> Vec<PositionState> {
        let mut out = vec![PositionState::Flat; self.len];
        for d in &self.decisions {
            if let Some(slot) = out.get_mut(d.index) {
                *slot = d.position;
            }
        }
        out
    }

    /// Issued signals only.
    pub fn issued(&self) -> impl Iterator<Item = &Decision> + '_ {
        self.decisions.iter().filter(|d| d.signal.is_issued())
    }

    /// Directional exposure over each step's return: +1 long, -1 short, 0 flat.
    ///
    /// A position opened at step `t` earns the return from `t` to `t + 1`, so the
    /// exposure at `t + 1` reflects the state after the decision at `t`.
    pub fn exposure(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.len];
        let mut direction = 0.0;
        for d in &self.decisions {
            direction = match (d.position, d.signal) {
                (PositionState::Flat, _) => 0.0,
                (PositionState::Held, Signal::None) => direction,
                (PositionState::Held, s) => f64::from(s.direction()),
            };
            if let Some(slot) = out.get_mut(d.index + 1) {
                *slot = direction;
            }
        }
        out
    }

    /// Number of issued signals (opens plus closes).
    pub fn trade_count(&self) -> usize {
        self.issued().count()
    }

    /// Replay the history and check single-open-position discipline.
    pub fn validate(&self) -> Result<(), StateError> {
        let mut position = PositionState::Flat;
        for d in &self.decisions {
            match (position, d.signal.is_issued(), d.position) {
                (prev, false, next) if prev != next => {
                    return Err(StateError::SilentTransition { index: d.index })
                }
                (PositionState::Held, true, PositionState::Held) => {
                    return Err(StateError::DoubleOpen { index: d.index })
                }
                (PositionState::Flat, true, PositionState::Flat) => {
                    return Err(StateError::CloseWhileFlat { index: d.index })
                }
                _ => {}
            }
            position = d.position;
        }
        Ok(())
    }
}
