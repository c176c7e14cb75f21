//! Subsampling policy for forest construction
//!
//! Trees are grown in rounds. Each round draws `n / tree_size` independent
//! subsets of exactly `tree_size` labels, so the planned tree count is the
//! smallest multiple of that batch size reaching the requested count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::errors::{RcfError, Result};
use crate::tree::Label;

/// How many trees a forest build will attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchPlan {
    /// Subsets drawn per round (`n / tree_size`)
    pub batch_size: usize,
    /// Rounds needed to reach the requested tree count
    pub rounds: usize,
    /// `rounds * batch_size`, never below the requested count
    pub planned_trees: usize,
}

impl BatchPlan {
    pub fn new(num_points: usize, num_trees: usize, tree_size: usize) -> Result<Self> {
        if num_trees == 0 {
            return Err(RcfError::InvalidArgument(
                "num_trees must be at least 1".to_string(),
            ));
        }
        if tree_size == 0 {
            return Err(RcfError::InvalidArgument(
                "tree_size must be at least 1".to_string(),
            ));
        }
        if tree_size > num_points {
            return Err(RcfError::InvalidArgument(format!(
                "tree_size {tree_size} exceeds the {num_points} available points"
            )));
        }

        let batch_size = num_points / tree_size;
        let rounds = num_trees.div_ceil(batch_size);
        Ok(Self {
            batch_size,
            rounds,
            planned_trees: rounds * batch_size,
        })
    }
}

/// Deterministic source of per-tree seeds
///
/// Seeds are drawn in a fixed order from one generator, so tree `i` gets the
/// same seed however the trees are later scheduled across workers.
#[derive(Debug, Clone)]
pub struct SeedSequence {
    rng: StdRng,
}

impl SeedSequence {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }

    pub fn take(&mut self, count: usize) -> Vec<u64> {
        (0..count).map(|_| self.next_seed()).collect()
    }
}

/// Draw `size` distinct labels from `0..num_points`, sorted ascending
pub fn draw_subsample<R: Rng + ?Sized>(rng: &mut R, num_points: usize, size: usize) -> Vec<Label> {
    let mut labels = rand::seq::index::sample(rng, num_points, size).into_vec();
    labels.sort_unstable();
    labels
}
