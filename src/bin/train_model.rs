//! Train the sign classifier from the landmark CSV.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use handsign::classifier::ForestParams;
use handsign::features::FeatureGeometry;
use handsign::training::{run_training, TrainingOptions};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Geometry {
    /// Detector coordinates as extracted
    Raw,
    /// Coordinates relative to the wrist landmark
    WristRelative,
}

impl From<Geometry> for FeatureGeometry {
    fn from(g: Geometry) -> Self {
        match g {
            Geometry::Raw => FeatureGeometry::Raw,
            Geometry::WristRelative => FeatureGeometry::WristRelative,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Train the random forest sign classifier")]
struct Args {
    /// Landmark CSV produced by extract_landmarks
    #[arg(short, long, default_value = "asl_landmarks.csv")]
    input: PathBuf,

    /// Where to write the trained model
    #[arg(short, long, default_value = "asl_model.bin")]
    output: PathBuf,

    /// Drop classes with fewer samples than this
    #[arg(long, default_value_t = 10)]
    min_samples: usize,

    /// Fraction of samples held out for testing
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of trees
    #[arg(long, default_value_t = 200)]
    trees: usize,

    #[arg(long, default_value_t = 20)]
    max_depth: usize,

    /// Cross-validation folds, reduced automatically for small classes
    #[arg(long, default_value_t = 5)]
    cv_folds: usize,

    /// Feature geometry applied before fitting, stored in the model
    #[arg(long, value_enum, default_value_t = Geometry::Raw)]
    geometry: Geometry,
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let args = Args::parse();

    let options = TrainingOptions {
        input: args.input,
        output: args.output,
        min_samples: args.min_samples,
        test_size: args.test_size,
        cv_folds: args.cv_folds,
        geometry: args.geometry.into(),
        forest: ForestParams {
            n_estimators: args.trees,
            max_depth: args.max_depth,
            seed: args.seed,
            ..ForestParams::default()
        },
    };

    run_training(&options)?;
    Ok(())
}
