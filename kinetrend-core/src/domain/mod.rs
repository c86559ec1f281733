//! Domain types for KineTrend

pub mod kinematics;
pub mod series;
pub mod trend;

pub use kinematics::{KinematicCovariance, KinematicState};
pub use series::{Series, SeriesError};
pub use trend::{PositionState, Signal, TrendLabel};
