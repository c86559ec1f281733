//! Series loading for the runner.
//!
//! Each instrument resolves to a [`Series`] from one of two places:
//! 1. A dated CSV file (first column `%Y-%m-%d`, values from a named or the second column)
//! 2. A seeded synthetic generator (tagged, so reports can tell the two apart)
//!
//! Rows are sorted by date after reading; duplicate dates are an error and empty value
//! cells are skipped.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use kinetrend_core::domain::{Series, SeriesError};
use kinetrend_core::synthetic;

use crate::config::{InstrumentSpec, SourceSpec};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: no column named '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: expected a date column and at least one value column")]
    TooFewColumns { path: PathBuf },

    #[error("{path} line {line}: cannot parse date '{value}'")]
    BadDate {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path} line {line}: cannot parse value '{value}'")]
    BadValue {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{path}: duplicate date {date}")]
    DuplicateDate { path: PathBuf, date: NaiveDate },

    #[error("invalid series for '{symbol}': {source}")]
    Series {
        symbol: String,
        #[source]
        source: SeriesError,
    },
}

/// A loaded instrument with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSeries {
    pub symbol: String,
    pub series: Series,
    /// Calendar dates for CSV sources; `None` for synthetic ones.
    pub dates: Option<Vec<NaiveDate>>,
    /// Noiseless signal behind a periodic source.
    pub truth: Option<Vec<f64>>,
    pub synthetic: bool,
    /// BLAKE3 over times and values.
    pub dataset_hash: String,
}

impl LoadedSeries {
    fn new(
        symbol: &str,
        series: Series,
        dates: Option<Vec<NaiveDate>>,
        truth: Option<Vec<f64>>,
    ) -> Self {
        let dataset_hash = dataset_hash(&series);
        Self {
            symbol: symbol.to_string(),
            synthetic: dates.is_none(),
            series,
            dates,
            truth,
            dataset_hash,
        }
    }
}

/// Resolve one configured instrument into a series.
pub fn load_instrument(spec: &InstrumentSpec) -> Result<LoadedSeries, LoadError> {
    let symbol = spec.symbol.as_str();
    let series_err = |source| LoadError::Series {
        symbol: symbol.to_string(),
        source,
    };

    match &spec.source {
        SourceSpec::Csv { path, column } => {
            let observations = load_csv(path, column.as_deref())?;
            let series = Series::from_dated(&observations).map_err(series_err)?;
            let dates = observations.iter().map(|(d, _)| *d).collect();
            tracing::debug!(symbol, path = %path.display(), rows = series.len(), "loaded csv");
            Ok(LoadedSeries::new(symbol, series, Some(dates), None))
        }
        SourceSpec::Periodic {
            periods,
            nobs,
            scale,
            seed,
        } => {
            let sample = synthetic::periodic(*periods, *nobs, *scale, *seed);
            let series = Series::new(sample.t, sample.observed).map_err(series_err)?;
            Ok(LoadedSeries::new(symbol, series, None, Some(sample.signal)))
        }
        SourceSpec::RandomWalk {
            n,
            start,
            drift,
            vol,
            seed,
        } => {
            let prices = synthetic::random_walk(*n, *start, *drift, *vol, *seed);
            let series = Series::from_values(prices).map_err(series_err)?;
            Ok(LoadedSeries::new(symbol, series, None, None))
        }
    }
}

/// Read dated observations from a CSV file.
pub fn load_csv(path: &Path, column: Option<&str>) -> Result<Vec<(NaiveDate, f64)>, LoadError> {
    let reader = csv::Reader::from_path(path).map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    read_observations(reader, path, column)
}

/// Read dated observations from any CSV reader; `origin` is only used in errors.
pub fn read_observations<R: Read>(
    mut reader: csv::Reader<R>,
    origin: &Path,
    column: Option<&str>,
) -> Result<Vec<(NaiveDate, f64)>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_err)?.clone();
    if headers.len() < 2 {
        return Err(LoadError::TooFewColumns {
            path: origin.to_path_buf(),
        });
    }
    let value_idx = match column {
        Some(name) => headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| LoadError::MissingColumn {
                path: origin.to_path_buf(),
                column: name.to_string(),
            })?,
        None => 1,
    };

    let mut observations = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let date_raw = record.get(0).unwrap_or("").trim();
        let date = NaiveDate::parse_from_str(date_raw, DATE_FORMAT).map_err(|_| {
            LoadError::BadDate {
                path: origin.to_path_buf(),
                line,
                value: date_raw.to_string(),
            }
        })?;
        let value_raw = record.get(value_idx).unwrap_or("").trim();
        if value_raw.is_empty() {
            skipped += 1;
            continue;
        }
        let value: f64 = value_raw.parse().map_err(|_| LoadError::BadValue {
            path: origin.to_path_buf(),
            line,
            value: value_raw.to_string(),
        })?;
        observations.push((date, value));
    }
    if skipped > 0 {
        tracing::warn!(path = %origin.display(), skipped, "skipped rows with empty values");
    }

    observations.sort_by_key(|(d, _)| *d);
    if let Some(pair) = observations.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(LoadError::DuplicateDate {
            path: origin.to_path_buf(),
            date: pair[0].0,
        });
    }
    Ok(observations)
}

/// Deterministic BLAKE3 hash over a series' times and values.
pub fn dataset_hash(series: &Series) -> String {
    let mut hasher = blake3::Hasher::new();
    for (t, v) in series.times().iter().zip(series.values()) {
        hasher.update(&t.to_le_bytes());
        hasher.update(&v.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
