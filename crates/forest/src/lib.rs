//! Robust Random Cut Forest anomaly detection
//!
//! Scores points of a time-ordered series by how easily randomized
//! axis-aligned cuts isolate them from the rest of the data.
//!
//! Modules:
//! - `shingle`: Sliding-window embedding of a series into points
//! - `bbox`: Bounding boxes and range-proportional cut sampling
//! - `tree`: Random cut tree with insert, delete, displacement and codisp
//! - `sampling`: Batch plan and per-tree seeds for forest construction
//! - `forest`: Parallel forest construction and score aggregation
//! - `aggregate`: Score accumulation, quantile thresholding, separation ratio
//! - `pipeline`: Shingle-to-report detection entry points

pub mod aggregate;
pub mod bbox;
pub mod errors;
pub mod forest;
pub mod pipeline;
pub mod sampling;
pub mod shingle;
pub mod tree;

pub use aggregate::{
    classify, quantile, Classification, PointScore, ScoreAccumulator, Scores, DEFAULT_QUANTILE,
};
pub use bbox::BoundingBox;
pub use errors::{RcfError, Result};
pub use forest::{BuildStats, Forest, ForestParams, SampledTree};
pub use pipeline::{detect, detect_rows, DetectionParams, DetectionReport};
pub use sampling::{BatchPlan, SeedSequence};
pub use shingle::{shingle, shingle_points, shingle_rows, Shingles};
pub use tree::{Branch, Label, Leaf, Node, NodeId, RandomCutTree};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
