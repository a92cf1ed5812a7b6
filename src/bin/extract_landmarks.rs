//! Build the landmark CSV from a directory of labeled hand images.
//!
//! Expects `<DATASET_DIR>/<label>/<image>`; every image with a detected
//! hand becomes one row of `x0,y0,...,x20,y20,label`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use handsign::config::Config;
use handsign::dataset::build_dataset;
use handsign::engine::{HandTracker, ModelPool};

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract hand landmarks from a labeled image dataset")]
struct Args {
    /// Dataset root with one sub-directory per label
    dataset_dir: PathBuf,

    /// Output CSV path
    #[arg(short, long, default_value = "asl_landmarks.csv")]
    output: PathBuf,

    /// Configuration file with model paths and detector thresholds
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });

    info!("Looking for dataset at: {}", args.dataset_dir.display());

    let pool = Arc::new(ModelPool::new(&config.inference, &config.models)?);
    let tracker = HandTracker::new(pool, &config.inference);

    let summary = build_dataset(&tracker, &args.dataset_dir, &args.output)?;

    info!("Summary:");
    for (label, stats) in &summary.labels {
        info!(
            "  {:>10}: {} rows from {} files ({} unreadable, {} without hand)",
            label, stats.written, stats.images, stats.unreadable, stats.no_hand
        );
    }
    info!(
        "Landmark extraction completed: {} rows written to {}",
        summary.total_written(),
        args.output.display()
    );

    Ok(())
}
