//! CSV time series loading
//!
//! Expects a header row. The first column holds the timestamp and the value
//! is read from a named column. Blank lines are skipped; rows with a blank
//! timestamp or value are rejected with their line number.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::errors::{DetectorError, Result};
use crate::events::parse_timestamp;

/// Timestamped scalar series
#[derive(Clone, Debug)]
pub struct Dataset {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// Min, max and mean of the series
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Dataset {
    /// Load a dataset from a CSV file
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        value_column: &str,
        timestamp_format: &str,
    ) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|err| {
            DetectorError::Dataset(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        Self::from_reader(file, value_column, timestamp_format)
    }

    /// Load a dataset from any CSV source
    pub fn from_reader<R: Read>(
        reader: R,
        value_column: &str,
        timestamp_format: &str,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let value_idx = reader
            .headers()?
            .iter()
            .position(|h| h == value_column)
            .ok_or_else(|| {
                DetectorError::Dataset(format!("missing value column '{value_column}'"))
            })?;
        if value_idx == 0 {
            return Err(DetectorError::Dataset(
                "value column cannot be the timestamp column".to_string(),
            ));
        }

        let mut timestamps = Vec::new();
        let mut values = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            // Blank lines are skipped by the reader, so count from its position
            let line = record
                .position()
                .map_or(row_idx as u64 + 2, |pos| pos.line());

            let raw_ts = record.get(0).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts, timestamp_format).ok_or_else(|| {
                DetectorError::Dataset(format!("Line {line}: invalid timestamp '{raw_ts}'"))
            })?;

            let raw_value = record.get(value_idx).unwrap_or_default();
            let value = raw_value.parse::<f64>().map_err(|_| {
                DetectorError::Dataset(format!("Line {line}: invalid value '{raw_value}'"))
            })?;

            timestamps.push(timestamp);
            values.push(value);
        }

        if values.is_empty() {
            return Err(DetectorError::Dataset("Dataset is empty".to_string()));
        }

        Ok(Self { timestamps, values })
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if dataset is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Summary statistics for logging
    pub fn value_stats(&self) -> Option<ValueStats> {
        if self.values.is_empty() {
            return None;
        }
        let (min, max, sum) = self.values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), &v| (lo.min(v), hi.max(v), sum + v),
        );
        Some(ValueStats {
            min,
            max,
            mean: sum / self.values.len() as f64,
        })
    }
}
