//! RRCF anomaly detector CLI
//!
//! Scores a CSV time series with a robust random cut forest and reports how
//! well the flagged windows separate from the rest.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rrcf_detector::{detect_csv, write_csv, DetectorConfig, VERSION};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "rrcf-detect")]
#[command(author = "RRCF Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Robust random cut forest anomaly detection for time series", long_about = None)]
struct Args {
    /// Input CSV path (timestamp in the first column)
    #[arg(short, long)]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of trees requested
    #[arg(long)]
    trees: Option<usize>,

    /// Points sampled into each tree
    #[arg(long)]
    tree_size: Option<usize>,

    /// Window length used to embed the series
    #[arg(long)]
    shingle_size: Option<usize>,

    /// Score quantile used as the outlier threshold
    #[arg(long)]
    quantile: Option<f64>,

    /// Seed for tree sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads for forest construction and scoring
    #[arg(long)]
    workers: Option<usize>,

    /// Write per-window scores to this CSV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut DetectorConfig) {
        let detection = &mut config.detection;
        if let Some(trees) = self.trees {
            detection.forest.num_trees = trees;
        }
        if let Some(tree_size) = self.tree_size {
            detection.forest.tree_size = tree_size;
        }
        if let Some(shingle_size) = self.shingle_size {
            detection.shingle_size = shingle_size;
        }
        if let Some(quantile) = self.quantile {
            detection.quantile = quantile;
        }
        if let Some(seed) = self.seed {
            detection.forest.seed = seed;
        }
        if let Some(workers) = self.workers {
            detection.forest.workers = Some(workers);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DetectorConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    let env_applied = config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    args.apply(&mut config);

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(config.logging.with_target)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!(
        "RRCF Anomaly Detector v{} (forest v{})",
        VERSION,
        rrcf_forest::VERSION
    );
    for key in &env_applied {
        debug!("Environment override: {}", key);
    }
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let detection = &config.detection;
    info!("Detection configuration:");
    info!("  Shingle size: {}", detection.shingle_size);
    info!("  Trees: {}", detection.forest.num_trees);
    info!("  Tree size: {}", detection.forest.tree_size);
    info!("  Quantile: {}", detection.quantile);
    info!("  Seed: {}", detection.forest.seed);
    info!("  Events: {}", config.events.len());

    info!("Loading dataset from: {}", args.input.display());
    let outcome = detect_csv(&args.input, &config).context("Detection failed")?;

    info!("Loaded {} samples", outcome.dataset.len());
    if let Some(stats) = outcome.dataset.value_stats() {
        info!(
            "  Values: min={}, max={}, mean={:.3}",
            stats.min, stats.max, stats.mean
        );
    }

    let summary = &outcome.summary;
    info!(
        "Trees requested: {}, realized: {}",
        summary.requested_trees, summary.realized_trees
    );
    if summary.skipped_trees > 0 {
        warn!("{} trees skipped", summary.skipped_trees);
    }
    info!("Threshold: {}", summary.threshold);
    info!(
        "Outliers: {} ({} inside known events, {} event windows)",
        summary.outlier_count, summary.outliers_in_events, summary.event_windows
    );

    if let Some(path) = &args.output {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(&outcome.records, BufWriter::new(file)).context("Failed to write scores")?;
        info!("Scores written to: {}", path.display());
    }

    if args.json {
        let json =
            serde_json::to_string_pretty(summary).context("Failed to serialize summary")?;
        println!("{json}");
    }

    println!("Score: {}", summary.ratio_display());
    Ok(())
}
