//! Detector configuration management
//!
//! Configuration is read from TOML, then overridden from `RRCF_*` environment
//! variables, then from command-line flags.

use std::path::Path;

use rrcf_forest::DetectionParams;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{DetectorError, Result};
use crate::events::{EventWindow, TIMESTAMP_FORMAT};

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectorConfig {
    /// Shingling, forest and classification parameters
    pub detection: DetectionParams,
    /// Input layout
    pub data: DataConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Known events to annotate windows with
    pub events: Vec<EventWindow>,
}

/// Input dataset layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Column holding the series value
    pub value_column: String,
    /// `chrono` format of the timestamp column
    pub timestamp_format: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            value_column: "value".to_string(),
            timestamp_format: TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Include the event target in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: false,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DetectorError::Config(format!("{key}: cannot parse '{raw}'")))
}

impl DetectorConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DetectorError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DetectorError::Config(format!("Failed to serialize config: {e}")))
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_toml_string()?)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Parameters handed to the forest pipeline
    pub fn detection_params(&self) -> DetectionParams {
        self.detection.clone()
    }

    /// Apply `RRCF_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<Vec<String>> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, returning the keys that were set
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<Vec<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        let detection = &mut self.detection;

        if let Some(val) = lookup("RRCF_NUM_TREES") {
            detection.forest.num_trees = parse_env("RRCF_NUM_TREES", &val)?;
            applied.push("detection.num_trees".to_string());
        }
        if let Some(val) = lookup("RRCF_TREE_SIZE") {
            detection.forest.tree_size = parse_env("RRCF_TREE_SIZE", &val)?;
            applied.push("detection.tree_size".to_string());
        }
        if let Some(val) = lookup("RRCF_SHINGLE_SIZE") {
            detection.shingle_size = parse_env("RRCF_SHINGLE_SIZE", &val)?;
            applied.push("detection.shingle_size".to_string());
        }
        if let Some(val) = lookup("RRCF_QUANTILE") {
            detection.quantile = parse_env("RRCF_QUANTILE", &val)?;
            applied.push("detection.quantile".to_string());
        }
        if let Some(val) = lookup("RRCF_SEED") {
            detection.forest.seed = parse_env("RRCF_SEED", &val)?;
            applied.push("detection.seed".to_string());
        }
        if let Some(val) = lookup("RRCF_WORKERS") {
            detection.forest.workers = Some(parse_env("RRCF_WORKERS", &val)?);
            applied.push("detection.workers".to_string());
        }
        if let Some(val) = lookup("RRCF_LOG_LEVEL") {
            self.logging.level = val;
            applied.push("logging.level".to_string());
        }

        Ok(applied)
    }

    /// Reject configurations that cannot run
    pub fn check(&self) -> Result<()> {
        let detection = &self.detection;
        if detection.shingle_size == 0 {
            return Err(DetectorError::Config("shingle_size must be at least 1".to_string()));
        }
        if detection.forest.num_trees == 0 {
            return Err(DetectorError::Config("num_trees must be at least 1".to_string()));
        }
        if detection.forest.tree_size == 0 {
            return Err(DetectorError::Config("tree_size must be at least 1".to_string()));
        }
        if !(detection.quantile > 0.0 && detection.quantile < 1.0) {
            return Err(DetectorError::Config(format!(
                "quantile {} must lie strictly between 0 and 1",
                detection.quantile
            )));
        }
        if detection.forest.workers == Some(0) {
            return Err(DetectorError::Config("workers must be at least 1".to_string()));
        }
        for event in &self.events {
            event.check()?;
        }
        Ok(())
    }

    /// Non-fatal issues worth logging
    pub fn validate(&self) -> Vec<String> {
        let detection = &self.detection;
        let mut warnings = Vec::new();

        if detection.forest.num_trees < 10 {
            warnings.push(format!(
                "Only {} trees requested, scores will be noisy",
                detection.forest.num_trees
            ));
        }
        if detection.shingle_size == 1 {
            warnings.push("Shingle size 1 ignores temporal context".to_string());
        }
        if detection.quantile < 0.5 {
            warnings.push(format!(
                "Quantile {} flags most points as outliers",
                detection.quantile
            ));
        }
        if let Some(workers) = detection.forest.workers {
            let cpus = num_cpus::get();
            if workers > cpus {
                warnings.push(format!(
                    "{workers} workers requested but only {cpus} CPUs available"
                ));
            }
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            warnings.push(format!(
                "Unknown log level '{}', falling back to info",
                self.logging.level
            ));
        }

        warnings
    }
}
