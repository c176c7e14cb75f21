//! End-to-end detection over a series: shingle, grow, score, classify

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{classify, Classification, PointScore, DEFAULT_QUANTILE};
use crate::errors::Result;
use crate::forest::{BuildStats, Forest, ForestParams};
use crate::shingle::{shingle_points, shingle_rows};

/// Parameters for one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    pub shingle_size: usize,
    pub quantile: f64,
    #[serde(flatten)]
    pub forest: ForestParams,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            shingle_size: 4,
            quantile: DEFAULT_QUANTILE,
            forest: ForestParams::default(),
        }
    }
}

/// Per-window scores plus forest and classification summary
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub shingle_size: usize,
    pub build: BuildStats,
    pub classification: Classification,
    /// `None` when either the outlier or inlier group is empty
    pub separation_ratio: Option<f64>,
}

impl DetectionReport {
    fn new(shingle_size: usize, build: BuildStats, classification: Classification) -> Self {
        let separation_ratio = classification.separation_ratio().ok();
        Self {
            shingle_size,
            build,
            classification,
            separation_ratio,
        }
    }

    /// Window scores, indexed by window start
    pub fn points(&self) -> &[PointScore] {
        &self.classification.points
    }

    /// Outlier-to-inlier mean score ratio
    pub fn separation_ratio(&self) -> Result<f64> {
        self.classification.separation_ratio()
    }

    /// Series index of the last sample in `window`
    pub fn series_index(&self, window: usize) -> usize {
        window + self.shingle_size - 1
    }

    pub fn realized_trees(&self) -> usize {
        self.build.realized_trees
    }
}

/// Detect anomalies in a scalar series
pub fn detect(series: &[f64], params: &DetectionParams) -> Result<DetectionReport> {
    let points = shingle_points(series, params.shingle_size)?;
    detect_points(&points, params)
}

/// Detect anomalies in a series of fixed-width rows
pub fn detect_rows(rows: &[Vec<f64>], params: &DetectionParams) -> Result<DetectionReport> {
    let points = shingle_rows(rows, params.shingle_size)?;
    detect_points(&points, params)
}

fn detect_points(points: &[Vec<f64>], params: &DetectionParams) -> Result<DetectionReport> {
    let forest = Forest::build(points, &params.forest)?;
    let scores = forest.score()?;
    let classification = classify(scores.values(), params.quantile)?;

    info!(
        windows = points.len(),
        threshold = classification.threshold,
        outliers = classification.outlier_count,
        "Classification complete"
    );

    Ok(DetectionReport::new(
        params.shingle_size,
        forest.stats(),
        classification,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RcfError;

    #[test]
    fn test_detect_flags_level_shift() {
        let mut series: Vec<f64> = (0..120).map(|i| (i % 5) as f64).collect();
        series[60] = 80.0;

        let params = DetectionParams {
            shingle_size: 3,
            quantile: 0.95,
            forest: ForestParams {
                num_trees: 30,
                tree_size: 40,
                seed: 7,
                workers: None,
            },
        };
        let report = detect(&series, &params).unwrap();

        assert_eq!(report.points().len(), 118);
        assert_eq!(report.realized_trees(), 30);
        assert_eq!(report.series_index(0), 2);
        // Windows starting at 58..=60 contain the spike
        let flagged: Vec<usize> = report
            .classification
            .outliers()
            .map(|p| p.label)
            .collect();
        assert!(flagged.iter().any(|w| (58..=60).contains(w)));
        assert!(report.separation_ratio().unwrap() > 1.0);
        assert_eq!(report.separation_ratio, report.separation_ratio().ok());
    }

    #[test]
    fn test_detect_rows_dimension() {
        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let params = DetectionParams {
            shingle_size: 2,
            forest: ForestParams {
                num_trees: 4,
                tree_size: 20,
                ..ForestParams::default()
            },
            ..DetectionParams::default()
        };
        let report = detect_rows(&rows, &params).unwrap();
        assert_eq!(report.points().len(), 49);
    }

    #[test]
    fn test_detect_rejects_bad_shingle() {
        let params = DetectionParams {
            shingle_size: 10,
            ..DetectionParams::default()
        };
        assert!(matches!(
            detect(&[1.0, 2.0], &params),
            Err(RcfError::InvalidArgument(_))
        ));
    }
}
