use rrcf_forest::RcfError;
use thiserror::Error;

/// Errors returned by the detector front end.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("detection error: {0}")]
    Detection(#[from] RcfError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DetectorError>;
