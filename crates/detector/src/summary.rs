//! Per-window results aligned to dataset timestamps

use std::io::Write;

use chrono::NaiveDateTime;
use rrcf_forest::DetectionReport;
use serde::Serialize;

use crate::errors::{DetectorError, Result};
use crate::events::{annotate, EventWindow, TIMESTAMP_FORMAT};

/// One scored window, keyed by the timestamp of its last sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRecord {
    pub timestamp: NaiveDateTime,
    pub codisp_score: Option<f64>,
    pub is_outlier: bool,
    pub event: Option<String>,
}

/// Run summary for logging and JSON output
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub windows: usize,
    pub requested_trees: usize,
    pub realized_trees: usize,
    pub skipped_trees: usize,
    pub cancelled_trees: usize,
    pub threshold: f64,
    pub outlier_count: usize,
    pub outliers_in_events: usize,
    pub event_windows: usize,
    pub avg_outlier_score: Option<f64>,
    pub avg_inlier_score: Option<f64>,
    pub separation_ratio: Option<f64>,
}

impl Summary {
    pub fn from_report(report: &DetectionReport, records: &[WindowRecord]) -> Self {
        let classification = &report.classification;
        let event_windows = records.iter().filter(|r| r.event.is_some()).count();
        let outliers_in_events = records
            .iter()
            .filter(|r| r.is_outlier && r.event.is_some())
            .count();

        Self {
            windows: classification.points.len(),
            requested_trees: report.build.requested_trees,
            realized_trees: report.build.realized_trees,
            skipped_trees: report.build.skipped_trees,
            cancelled_trees: report.build.cancelled_trees,
            threshold: classification.threshold,
            outlier_count: classification.outlier_count,
            outliers_in_events,
            event_windows,
            avg_outlier_score: classification.avg_outlier_score,
            avg_inlier_score: classification.avg_inlier_score,
            separation_ratio: report.separation_ratio,
        }
    }

    /// Separation ratio as printed, `undefined` when a group is empty
    pub fn ratio_display(&self) -> String {
        match self.separation_ratio {
            Some(ratio) => ratio.to_string(),
            None => "undefined".to_string(),
        }
    }
}

/// Pair each window with the timestamp of its last sample and any event covering it
pub fn window_records(
    report: &DetectionReport,
    timestamps: &[NaiveDateTime],
    events: &[EventWindow],
) -> Result<Vec<WindowRecord>> {
    let points = report.points();
    let expected = points.len() + report.shingle_size - 1;
    if timestamps.len() != expected {
        return Err(DetectorError::Dataset(format!(
            "{} timestamps for {} windows of size {}",
            timestamps.len(),
            points.len(),
            report.shingle_size
        )));
    }

    let window_ends = &timestamps[report.series_index(0)..];
    let covering = annotate(window_ends.iter().copied(), events);

    Ok(points
        .iter()
        .zip(window_ends)
        .zip(covering)
        .map(|((point, &timestamp), event)| WindowRecord {
            timestamp,
            codisp_score: point.codisp_score,
            is_outlier: point.is_outlier,
            event: event.map(str::to_string),
        })
        .collect())
}

/// Write records as CSV; undefined scores are left empty
pub fn write_csv<W: Write>(records: &[WindowRecord], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["timestamp", "codisp_score", "is_outlier", "event"])?;
    for record in records {
        out.write_record([
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            record
                .codisp_score
                .map(|s| s.to_string())
                .unwrap_or_default(),
            record.is_outlier.to_string(),
            record.event.clone().unwrap_or_default(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::parse_timestamp;
    use rrcf_forest::{detect, DetectionParams, ForestParams};

    fn hourly(count: usize) -> Vec<NaiveDateTime> {
        let start = parse_timestamp("2014-11-26 20:00:00", TIMESTAMP_FORMAT).unwrap();
        (0..count)
            .map(|i| start + chrono::Duration::hours(i as i64))
            .collect()
    }

    fn small_report(series: &[f64]) -> DetectionReport {
        let params = DetectionParams {
            shingle_size: 3,
            quantile: 0.9,
            forest: ForestParams {
                num_trees: 10,
                tree_size: 20,
                seed: 5,
                workers: Some(1),
            },
        };
        detect(series, &params).unwrap()
    }

    #[test]
    fn test_records_align_to_last_sample() {
        let series: Vec<f64> = (0..40).map(|i| (i % 4) as f64).collect();
        let report = small_report(&series);
        let timestamps = hourly(series.len());
        let events = vec![EventWindow::new(
            "thanksgiving",
            "2014-11-27 00:00:00",
            "2014-11-28 00:00:00",
        )
        .unwrap()];

        let records = window_records(&report, &timestamps, &events).unwrap();
        assert_eq!(records.len(), 38);
        assert_eq!(records[0].timestamp, timestamps[2]);
        assert_eq!(records[37].timestamp, timestamps[39]);
        // 2014-11-27 00:00 is index 4, window 2
        assert_eq!(records[1].event, None);
        assert_eq!(records[2].event.as_deref(), Some("thanksgiving"));

        let summary = Summary::from_report(&report, &records);
        assert_eq!(summary.windows, 38);
        assert_eq!(summary.event_windows, 25);
        assert_eq!(summary.realized_trees, 10);

        assert!(window_records(&report, &timestamps[1..], &events).is_err());
    }

    #[test]
    fn test_ratio_display() {
        let series: Vec<f64> = (0..30).map(|i| (i % 3) as f64).collect();
        let report = small_report(&series);
        let records = window_records(&report, &hourly(series.len()), &[]).unwrap();
        let mut summary = Summary::from_report(&report, &records);

        summary.separation_ratio = None;
        assert_eq!(summary.ratio_display(), "undefined");
        summary.separation_ratio = Some(2.5);
        assert_eq!(summary.ratio_display(), "2.5");
    }

    #[test]
    fn test_write_csv() {
        let timestamps = hourly(2);
        let records = vec![
            WindowRecord {
                timestamp: timestamps[0],
                codisp_score: Some(1.5),
                is_outlier: false,
                event: None,
            },
            WindowRecord {
                timestamp: timestamps[1],
                codisp_score: None,
                is_outlier: false,
                event: Some("new_year".to_string()),
            },
        ];

        let mut buffer = Vec::new();
        write_csv(&records, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "timestamp,codisp_score,is_outlier,event");
        assert_eq!(lines[1], "2014-11-26 20:00:00,1.5,false,");
        assert_eq!(lines[2], "2014-11-26 21:00:00,,false,new_year");
    }
}
