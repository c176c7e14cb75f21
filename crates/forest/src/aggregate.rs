//! Score aggregation and outlier classification
//!
//! Per-tree codisp values are folded into a running `(sum, count)` per label.
//! Partial accumulators merge by componentwise addition, so any grouping of
//! trees produces the same totals. Labels never sampled keep a zero count and
//! an undefined score.

use serde::Serialize;

use crate::errors::{RcfError, Result};
use crate::tree::{Label, RandomCutTree};

/// Default score quantile above which points are outliers
pub const DEFAULT_QUANTILE: f64 = 0.99;

/// Running codisp totals keyed by label
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreAccumulator {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl ScoreAccumulator {
    /// Accumulator for labels `0..num_labels`
    pub fn new(num_labels: usize) -> Self {
        Self {
            sums: vec![0.0; num_labels],
            counts: vec![0; num_labels],
        }
    }

    pub fn num_labels(&self) -> usize {
        self.sums.len()
    }

    /// Record one tree's score for `label`
    pub fn add(&mut self, label: Label, score: f64) -> Result<()> {
        if label >= self.sums.len() {
            return Err(RcfError::InvalidArgument(format!(
                "label {} outside accumulator range 0..{}",
                label,
                self.sums.len()
            )));
        }
        self.sums[label] += score;
        self.counts[label] += 1;
        Ok(())
    }

    /// Record codisp for every label in `tree`
    pub fn add_tree(&mut self, tree: &RandomCutTree) -> Result<()> {
        for (label, score) in tree.codisp_all()? {
            self.add(label, score)?;
        }
        Ok(())
    }

    /// Combine two partial accumulators
    pub fn merge(mut self, other: ScoreAccumulator) -> ScoreAccumulator {
        if other.sums.len() > self.sums.len() {
            self.sums.resize(other.sums.len(), 0.0);
            self.counts.resize(other.counts.len(), 0);
        }
        for (label, (sum, count)) in other.sums.into_iter().zip(other.counts).enumerate() {
            self.sums[label] += sum;
            self.counts[label] += count;
        }
        self
    }

    /// Mean score per label
    pub fn finish(self) -> Scores {
        let values = self
            .sums
            .iter()
            .zip(&self.counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect();
        Scores {
            values,
            counts: self.counts,
        }
    }
}

/// Mean codisp per label, `None` where no tree held the label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    values: Vec<Option<f64>>,
    counts: Vec<usize>,
}

impl Scores {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Number of trees that scored `label`
    pub fn count(&self, label: Label) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Mean score of `label`
    pub fn get(&self, label: Label) -> Result<f64> {
        match self.values.get(label) {
            Some(Some(score)) => Ok(*score),
            Some(None) => Err(RcfError::UndefinedResult(format!(
                "label {label} was not sampled by any tree"
            ))),
            None => Err(RcfError::LabelNotFound(label)),
        }
    }

    /// Labels that no tree sampled
    pub fn undefined_labels(&self) -> Vec<Label> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(label, v)| v.is_none().then_some(label))
            .collect()
    }
}

/// Score and classification of one point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointScore {
    pub label: Label,
    pub codisp_score: Option<f64>,
    pub is_outlier: bool,
}

/// Outcome of thresholding a score distribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub quantile: f64,
    pub threshold: f64,
    pub points: Vec<PointScore>,
    pub outlier_count: usize,
    pub inlier_count: usize,
    pub avg_outlier_score: Option<f64>,
    pub avg_inlier_score: Option<f64>,
}

impl Classification {
    /// `avg_outlier_score / avg_inlier_score`
    ///
    /// Undefined when either group is empty or the inlier mean is zero.
    pub fn separation_ratio(&self) -> Result<f64> {
        let outlier = self.avg_outlier_score.ok_or_else(|| {
            RcfError::UndefinedResult("no point scored above the threshold".to_string())
        })?;
        let inlier = self.avg_inlier_score.ok_or_else(|| {
            RcfError::UndefinedResult("no point scored at or below the threshold".to_string())
        })?;
        if inlier == 0.0 {
            return Err(RcfError::UndefinedResult(
                "average inlier score is zero".to_string(),
            ));
        }
        Ok(outlier / inlier)
    }

    pub fn outliers(&self) -> impl Iterator<Item = &PointScore> + '_ {
        self.points.iter().filter(|p| p.is_outlier)
    }
}

/// Linear-interpolation quantile of ascending `sorted` values
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Flag points whose score exceeds the `q`-th quantile of defined scores
pub fn classify(scores: &[Option<f64>], q: f64) -> Result<Classification> {
    if !(q > 0.0 && q < 1.0) {
        return Err(RcfError::InvalidArgument(format!(
            "quantile {q} must lie strictly between 0 and 1"
        )));
    }

    let mut defined: Vec<f64> = scores.iter().flatten().copied().collect();
    defined.sort_by(f64::total_cmp);
    let threshold = quantile(&defined, q).ok_or_else(|| {
        RcfError::UndefinedResult("no defined scores to classify".to_string())
    })?;

    let points: Vec<PointScore> = scores
        .iter()
        .enumerate()
        .map(|(label, &codisp_score)| PointScore {
            label,
            codisp_score,
            is_outlier: codisp_score.is_some_and(|s| s > threshold),
        })
        .collect();

    let outlier_scores = || points.iter().filter(|p| p.is_outlier).filter_map(|p| p.codisp_score);
    let inlier_scores = || points.iter().filter(|p| !p.is_outlier).filter_map(|p| p.codisp_score);

    Ok(Classification {
        quantile: q,
        threshold,
        outlier_count: outlier_scores().count(),
        inlier_count: inlier_scores().count(),
        avg_outlier_score: mean(outlier_scores()),
        avg_inlier_score: mean(inlier_scores()),
        points,
    })
}
