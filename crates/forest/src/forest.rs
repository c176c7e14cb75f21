//! Random cut forest construction and scoring
//!
//! Every tree is grown from its own subsample and its own seed, so trees are
//! built in parallel with no shared mutable state. A subsample whose tree
//! cannot be built is skipped and counted instead of failing the forest.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{ScoreAccumulator, Scores};
use crate::errors::{RcfError, Result};
use crate::sampling::{draw_subsample, BatchPlan, SeedSequence};
use crate::tree::{Label, RandomCutTree};

/// Trees folded into one partial accumulator during scoring.
/// Fixed so the summation order does not depend on the worker count.
const SCORE_CHUNK: usize = 16;

/// Forest construction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Minimum number of trees to grow
    pub num_trees: usize,
    /// Points sampled per tree
    pub tree_size: usize,
    /// Master seed for subsampling and cuts
    pub seed: u64,
    /// Dedicated worker count, `None` for the global rayon pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            tree_size: 256,
            seed: 42,
            workers: None,
        }
    }
}

/// A tree tagged with the labels it was grown from
#[derive(Debug, Clone)]
pub struct SampledTree {
    tree: RandomCutTree,
    sample: Vec<Label>,
    seed: u64,
}

impl SampledTree {
    pub fn tree(&self) -> &RandomCutTree {
        &self.tree
    }

    /// Sampled labels, ascending
    pub fn sample(&self) -> &[Label] {
        &self.sample
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Tree counts recorded during construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub requested_trees: usize,
    pub batch_size: usize,
    pub rounds: usize,
    pub planned_trees: usize,
    pub realized_trees: usize,
    pub skipped_trees: usize,
    pub cancelled_trees: usize,
}

enum TreeOutcome {
    Built(SampledTree),
    Skipped,
    Cancelled,
}

/// Immutable ensemble of random cut trees over one point set
#[derive(Debug, Clone)]
pub struct Forest {
    trees: Vec<SampledTree>,
    num_points: usize,
    dimension: usize,
    workers: Option<usize>,
    stats: BuildStats,
}

impl Forest {
    /// Grow a forest over `points`; point `i` carries label `i`
    pub fn build(points: &[Vec<f64>], params: &ForestParams) -> Result<Self> {
        Self::build_cancellable(points, params, &AtomicBool::new(false))
    }

    /// Like [`Forest::build`], but trees not yet started when `cancel` is set
    /// are abandoned and counted as cancelled
    pub fn build_cancellable(
        points: &[Vec<f64>],
        params: &ForestParams,
        cancel: &AtomicBool,
    ) -> Result<Self> {
        let plan = BatchPlan::new(points.len(), params.num_trees, params.tree_size)?;

        let dimension = points[0].len();
        if let Some(idx) = points.iter().position(|p| p.len() != dimension) {
            return Err(RcfError::InvalidArgument(format!(
                "point {} has dimension {}, expected {}",
                idx,
                points[idx].len(),
                dimension
            )));
        }

        info!(
            points = points.len(),
            dimension,
            requested = params.num_trees,
            batch = plan.batch_size,
            rounds = plan.rounds,
            "Building random cut forest"
        );

        let seeds = SeedSequence::new(params.seed).take(plan.planned_trees);
        let outcomes: Vec<TreeOutcome> = run_in_pool(params.workers, || {
            seeds
                .par_iter()
                .enumerate()
                .map(|(idx, &seed)| {
                    if cancel.load(Ordering::Relaxed) {
                        return TreeOutcome::Cancelled;
                    }
                    match grow_tree(points, params.tree_size, seed) {
                        Ok(tree) => {
                            debug!(tree = idx, round = idx / plan.batch_size, "Tree built");
                            TreeOutcome::Built(tree)
                        }
                        Err(err) => {
                            warn!(tree = idx, error = %err, "Skipping subsample");
                            TreeOutcome::Skipped
                        }
                    }
                })
                .collect()
        })?;

        let mut trees = Vec::with_capacity(outcomes.len());
        let (mut skipped, mut cancelled) = (0, 0);
        for outcome in outcomes {
            match outcome {
                TreeOutcome::Built(tree) => trees.push(tree),
                TreeOutcome::Skipped => skipped += 1,
                TreeOutcome::Cancelled => cancelled += 1,
            }
        }

        let stats = BuildStats {
            requested_trees: params.num_trees,
            batch_size: plan.batch_size,
            rounds: plan.rounds,
            planned_trees: plan.planned_trees,
            realized_trees: trees.len(),
            skipped_trees: skipped,
            cancelled_trees: cancelled,
        };

        if stats.realized_trees != stats.requested_trees {
            info!(
                requested = stats.requested_trees,
                realized = stats.realized_trees,
                skipped,
                cancelled,
                "Realized tree count differs from request"
            );
        }

        Ok(Self {
            trees,
            num_points: points.len(),
            dimension,
            workers: params.workers,
            stats,
        })
    }

    pub fn trees(&self) -> &[SampledTree] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn stats(&self) -> BuildStats {
        self.stats
    }

    pub fn realized_trees(&self) -> usize {
        self.stats.realized_trees
    }

    /// Average codisp of every label over the trees that hold it
    pub fn score(&self) -> Result<Scores> {
        let partials: Vec<Result<ScoreAccumulator>> = run_in_pool(self.workers, || {
            self.trees
                .par_chunks(SCORE_CHUNK)
                .map(|chunk| {
                    let mut acc = ScoreAccumulator::new(self.num_points);
                    for sampled in chunk {
                        acc.add_tree(&sampled.tree)?;
                    }
                    Ok(acc)
                })
                .collect()
        })?;

        let mut total = ScoreAccumulator::new(self.num_points);
        for partial in partials {
            total = total.merge(partial?);
        }

        let scores = total.finish();
        let undefined = scores.undefined_labels().len();
        if undefined > 0 {
            warn!(undefined, "Some points were not sampled by any tree");
        }
        info!(trees = self.trees.len(), points = scores.len(), "Forest scored");

        Ok(scores)
    }
}

/// Sample `tree_size` labels with a per-tree generator and build the tree
fn grow_tree(points: &[Vec<f64>], tree_size: usize, seed: u64) -> Result<SampledTree> {
    let mut rng = StdRng::seed_from_u64(seed);
    let sample = draw_subsample(&mut rng, points.len(), tree_size);
    let subset: Vec<Vec<f64>> = sample.iter().map(|&label| points[label].clone()).collect();
    let tree = RandomCutTree::build(&subset, &sample, rng.gen())?;
    Ok(SampledTree { tree, sample, seed })
}

/// Run `op` on a dedicated pool of `workers` threads, or the global pool
fn run_in_pool<T, F>(workers: Option<usize>, op: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match workers {
        None => Ok(op()),
        Some(0) => Err(RcfError::InvalidArgument(
            "workers must be at least 1".to_string(),
        )),
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| RcfError::ThreadPool(e.to_string()))?;
            Ok(pool.install(op))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|i| vec![i as f64, (i % 7) as f64]).collect()
    }

    #[test]
    fn test_forest_size_is_batch_multiple() {
        let points = ramp(30);
        let params = ForestParams {
            num_trees: 10,
            tree_size: 10,
            seed: 1,
            workers: None,
        };
        let forest = Forest::build(&points, &params).unwrap();

        assert_eq!(forest.stats().batch_size, 3);
        assert_eq!(forest.realized_trees(), 12);
        assert_eq!(forest.len(), 12);
        for sampled in forest.trees() {
            assert_eq!(sampled.sample().len(), 10);
            assert_eq!(sampled.tree().leaf_count(), 10);
            assert_eq!(sampled.tree().validate(), Ok(()));
        }
    }

    #[test]
    fn test_forest_rejects_invalid_params() {
        let points = ramp(10);
        let mut params = ForestParams {
            num_trees: 5,
            tree_size: 11,
            ..ForestParams::default()
        };
        assert!(matches!(
            Forest::build(&points, &params),
            Err(RcfError::InvalidArgument(_))
        ));

        params.tree_size = 5;
        params.workers = Some(0);
        assert!(Forest::build(&points, &params).is_err());

        let ragged = vec![vec![0.0], vec![1.0, 2.0]];
        params.workers = None;
        params.tree_size = 1;
        assert!(Forest::build(&ragged, &params).is_err());
    }

    #[test]
    fn test_skipped_subsamples_are_counted() {
        let mut points = ramp(20);
        points[3] = vec![f64::NAN, 0.0];
        let params = ForestParams {
            num_trees: 40,
            tree_size: 10,
            seed: 5,
            workers: Some(2),
        };
        let forest = Forest::build(&points, &params).unwrap();
        let stats = forest.stats();

        assert!(stats.skipped_trees > 0);
        assert_eq!(stats.planned_trees, 40);
        assert_eq!(stats.realized_trees + stats.skipped_trees, 40);
        assert!(forest.trees().iter().all(|t| !t.sample().contains(&3)));

        let scores = forest.score().unwrap();
        assert!(scores.get(3).is_err());
    }

    #[test]
    fn test_extreme_coordinates_build_every_tree() {
        let points: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![if i % 2 == 0 { -1e308 } else { 1e308 }, i as f64])
            .collect();
        let params = ForestParams {
            num_trees: 8,
            tree_size: 10,
            seed: 3,
            workers: Some(2),
        };
        let forest = Forest::build(&points, &params).unwrap();

        assert_eq!(forest.stats().skipped_trees, 0);
        assert_eq!(forest.realized_trees(), 8);
        let scores = forest.score().unwrap();
        assert!(scores.values().iter().flatten().all(|s| s.is_finite()));
    }

    #[test]
    fn test_cancelled_build() {
        let points = ramp(20);
        let params = ForestParams {
            num_trees: 4,
            tree_size: 5,
            ..Default::default()
        };
        let cancel = AtomicBool::new(true);
        let forest = Forest::build_cancellable(&points, &params, &cancel).unwrap();

        assert!(forest.is_empty());
        assert_eq!(forest.stats().cancelled_trees, 4);
        let scores = forest.score().unwrap();
        assert_eq!(scores.undefined_labels().len(), 20);
    }
}
