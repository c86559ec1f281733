//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! name = "fx-majors"
//!
//! [estimator]
//! noise_seed = 0.001
//!
//! [signals]
//! lookback = 5
//!
//! [spectral]
//! min_alpha = 0.05
//!
//! [[instruments]]
//! symbol = "EURUSD"
//! source = { type = "csv", path = "data/eurusd.csv", column = "close" }
//!
//! [[instruments]]
//! symbol = "SINE"
//! source = { type = "periodic", periods = 10, nobs = 300, scale = 0.5, seed = 0 }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kinetrend_core::kca::KineticConfig;
use kinetrend_core::signals::{Lookback, SignalPositionEngine, TrendClassifier};
use kinetrend_core::spectral::SpectralConfig;

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Lookback used when the config names neither `lookback` nor `lookback_days`.
pub const DEFAULT_LOOKBACK: usize = 5;

/// Default rolling window for metrics (one trading year).
pub const DEFAULT_METRICS_WINDOW: usize = 252;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything needed to reproduce a universe run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub name: String,

    pub estimator: KineticConfig,

    #[serde(default)]
    pub signals: SignalSettings,

    /// Spectral comparison; skipped when absent.
    #[serde(default)]
    pub spectral: Option<SpectralConfig>,

    #[serde(default)]
    pub metrics: MetricsSettings,

    pub instruments: Vec<InstrumentSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalSettings {
    /// Confirmation window in steps.
    pub lookback: Option<usize>,
    /// Confirmation window as a calendar span in days.
    pub lookback_days: Option<i64>,
    /// Dead band around zero for velocity and acceleration signs.
    pub epsilon: f64,
}

impl SignalSettings {
    pub fn lookback(&self) -> Result<Lookback, ConfigError> {
        match (self.lookback, self.lookback_days) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "signals.lookback and signals.lookback_days are mutually exclusive".into(),
            )),
            (Some(steps), None) => Ok(Lookback::Steps(steps)),
            (None, Some(days)) => Duration::try_days(days).map(Lookback::Span).ok_or_else(|| {
                ConfigError::Invalid(format!("signals.lookback_days out of range: {days}"))
            }),
            (None, None) => Ok(Lookback::Steps(DEFAULT_LOOKBACK)),
        }
    }

    pub fn classifier(&self) -> TrendClassifier {
        TrendClassifier::new(self.epsilon)
    }

    pub fn engine(&self) -> Result<SignalPositionEngine, ConfigError> {
        SignalPositionEngine::new(self.lookback()?)
            .map_err(|e| ConfigError::Invalid(format!("signals: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    pub window: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_METRICS_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstrumentSpec {
    pub symbol: String,
    pub source: SourceSpec,
}

/// Where an instrument's observations come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Dated CSV: first column `%Y-%m-%d`, values from `column` or the second column.
    Csv {
        path: PathBuf,
        #[serde(default)]
        column: Option<String>,
    },

    /// Noisy sine, see [`kinetrend_core::synthetic::periodic`].
    Periodic {
        periods: usize,
        nobs: usize,
        scale: f64,
        #[serde(default)]
        seed: u64,
    },

    /// Geometric random walk, see [`kinetrend_core::synthetic::random_walk`].
    RandomWalk {
        n: usize,
        start: f64,
        #[serde(default)]
        drift: f64,
        vol: f64,
        #[serde(default)]
        seed: u64,
    },
}

impl SourceSpec {
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, SourceSpec::Csv { .. })
    }
}

impl RunConfig {
    /// Load, resolve CSV paths relative to the file's directory, and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Join relative CSV paths onto `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for instrument in &mut self.instruments {
            if let SourceSpec::Csv { path, .. } = &mut instrument.source {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Invalid("at least one instrument is required".into()));
        }
        let mut seen = BTreeSet::new();
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(ConfigError::Invalid("instrument symbol is empty".into()));
            }
            if !seen.insert(instrument.symbol.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate instrument '{}'",
                    instrument.symbol
                )));
            }
        }

        self.estimator
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("estimator: {e}")))?;
        if let Some(spectral) = &self.spectral {
            spectral
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("spectral: {e}")))?;
        }
        if !(self.signals.epsilon.is_finite() && self.signals.epsilon >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "signals.epsilon must be finite and >= 0, got {}",
                self.signals.epsilon
            )));
        }
        self.signals.engine()?;
        if self.metrics.window < 2 {
            return Err(ConfigError::Invalid("metrics.window must be >= 2".into()));
        }
        Ok(())
    }

    /// BLAKE3 hash of the canonical JSON form.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
