//! RRCF Detector - CSV-driven anomaly detection over time series
//!
//! Loads a timestamped series, scores shingled windows with a robust random
//! cut forest, and relates the flagged windows to known calendar events.

pub mod config;
pub mod dataset;
pub mod errors;
pub mod events;
pub mod summary;

use std::path::Path;

use rrcf_forest::DetectionReport;
use tracing::info;

pub use config::{DataConfig, DetectorConfig, LoggingConfig};
pub use dataset::{Dataset, ValueStats};
pub use errors::{DetectorError, Result};
pub use events::{annotate, event_at, parse_timestamp, EventWindow, TIMESTAMP_FORMAT};
pub use summary::{window_records, write_csv, Summary, WindowRecord};

/// Everything produced by one detection run
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    pub dataset: Dataset,
    pub report: DetectionReport,
    pub records: Vec<WindowRecord>,
    pub summary: Summary,
}

/// Run detection on an already loaded dataset
pub fn detect_dataset(dataset: Dataset, config: &DetectorConfig) -> Result<DetectionOutcome> {
    config.check()?;
    let report = rrcf_forest::detect(&dataset.values, &config.detection_params())?;
    let records = window_records(&report, &dataset.timestamps, &config.events)?;
    let summary = Summary::from_report(&report, &records);

    info!(
        requested = summary.requested_trees,
        realized = summary.realized_trees,
        outliers = summary.outlier_count,
        in_events = summary.outliers_in_events,
        "Detection complete"
    );

    Ok(DetectionOutcome {
        dataset,
        report,
        records,
        summary,
    })
}

/// Load a CSV file and run detection with `config`
pub fn detect_csv(path: &Path, config: &DetectorConfig) -> Result<DetectionOutcome> {
    let dataset = Dataset::from_csv(
        path,
        &config.data.value_column,
        &config.data.timestamp_format,
    )?;
    detect_dataset(dataset, config)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
