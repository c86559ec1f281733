//! Trend regimes, trading signals and position states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinematic regime given by the signs of velocity and acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendLabel {
    /// velocity > 0, acceleration > 0
    Up,
    /// velocity < 0, acceleration < 0
    Down,
    /// velocity < 0, acceleration > 0
    ConvexUp,
    /// velocity > 0, acceleration < 0
    ConvexDown,
}

impl TrendLabel {
    /// Directional signal implied by a confirmed trend.
    pub fn signal(self) -> Signal {
        match self {
            TrendLabel::Up | TrendLabel::ConvexUp => Signal::Buy,
            TrendLabel::Down | TrendLabel::ConvexDown => Signal::Sell,
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendLabel::Up => "UP",
            TrendLabel::Down => "DOWN",
            TrendLabel::ConvexUp => "CONVEX UP",
            TrendLabel::ConvexDown => "CONVEX DOWN",
        };
        f.write_str(s)
    }
}

/// Signal emitted once per timestep per instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    None,
}

impl Signal {
    pub fn is_issued(self) -> bool {
        self != Signal::None
    }

    /// +1 for buy, -1 for sell, 0 for none.
    pub fn direction(self) -> i8 {
        match self {
            Signal::Buy => 1,
            Signal::Sell => -1,
            Signal::None => 0,
        }
    }
}

/// Whether an instrument currently has an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    #[default]
    Flat,
    Held,
}

impl PositionState {
    pub fn switched(self) -> Self {
        match self {
            PositionState::Flat => PositionState::Held,
            PositionState::Held => PositionState::Flat,
        }
    }
}
