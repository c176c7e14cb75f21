//! Error types for the random cut forest crate

use thiserror::Error;

use crate::tree::Label;

/// Errors that can occur while building or scoring trees and forests
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RcfError {
    /// A parameter or input value is outside its valid domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A label was inserted into a tree that already holds it
    #[error("Duplicate label: {0}")]
    DuplicateLabel(Label),

    /// A label was looked up in a tree that does not hold it
    #[error("Label not found: {0}")]
    LabelNotFound(Label),

    /// A result has no defined value (empty group, zero observations)
    #[error("Undefined result: {0}")]
    UndefinedResult(String),

    /// The worker pool for parallel construction could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result type for random cut forest operations
pub type Result<T> = std::result::Result<T, RcfError>;
