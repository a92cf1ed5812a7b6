//! Offline training pipeline: CSV in, classifier artifact out

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::classifier::metrics::mean_std;
use crate::classifier::validation::{class_counts, cross_val_accuracy, effective_folds, stratified_split};
use crate::classifier::{accuracy, ClassificationReport, ClassifierModel, ForestParams, RandomForest};
use crate::dataset::load_dataset;
use crate::features::FeatureGeometry;

/// Train/test accuracy gap above which the run is flagged as overfitting
pub const OVERFITTING_GAP: f64 = 0.15;

const OVERFITTING_ADVICE: [&str; 4] = [
    "Increasing min_samples_split and min_samples_leaf",
    "Reducing max_depth",
    "Adding more training data",
    "Using data augmentation",
];

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Classes with fewer samples are dropped before splitting
    pub min_samples: usize,
    pub test_size: f64,
    pub cv_folds: usize,
    pub geometry: FeatureGeometry,
    pub forest: ForestParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from("asl_landmarks.csv"),
            output: PathBuf::from("asl_model.bin"),
            min_samples: 10,
            test_size: 0.2,
            cv_folds: 5,
            geometry: FeatureGeometry::Raw,
            forest: ForestParams::default(),
        }
    }
}

/// Diagnostics of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub classes: Vec<String>,
    pub dropped: Vec<String>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub cv_scores: Vec<f64>,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub report: ClassificationReport,
}

impl TrainingReport {
    pub fn overfitting_gap(&self) -> f64 {
        self.train_accuracy - self.test_accuracy
    }

    pub fn is_overfitting(&self) -> bool {
        self.overfitting_gap() > OVERFITTING_GAP
    }
}

fn log_counts(stage: &str, counts: &BTreeMap<String, usize>) {
    let total: usize = counts.values().sum();
    info!("Dataset ({}): {} samples, {} classes", stage, total, counts.len());
    for (label, count) in counts {
        info!("  {:>10}: {}", label, count);
    }
}

/// Load the CSV, fit the forest, report diagnostics and save the artifact.
///
/// Deterministic for a given input file and `forest.seed`.
pub fn run_training(options: &TrainingOptions) -> Result<TrainingReport> {
    let samples = load_dataset(&options.input)?;
    if samples.is_empty() {
        bail!("no samples in {}", options.input.display());
    }

    let mut raw_counts: BTreeMap<String, usize> = BTreeMap::new();
    for sample in &samples {
        *raw_counts.entry(sample.label.clone()).or_default() += 1;
    }
    log_counts("raw", &raw_counts);

    let dropped: Vec<String> = raw_counts
        .iter()
        .filter(|&(_, &count)| count < options.min_samples)
        .map(|(label, _)| label.clone())
        .collect();
    if !dropped.is_empty() {
        info!(
            "Dropping underrepresented classes (fewer than {} samples): {:?}",
            options.min_samples, dropped
        );
    }

    let classes: Vec<String> = raw_counts
        .keys()
        .filter(|label| !dropped.contains(label))
        .cloned()
        .collect();
    if classes.is_empty() {
        bail!("no class has at least {} samples", options.min_samples);
    }
    let class_index: BTreeMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect();

    let mut features = Vec::new();
    let mut labels = Vec::new();
    for sample in &samples {
        if let Some(&class) = class_index.get(sample.label.as_str()) {
            features.push(options.geometry.apply(&sample.features).as_slice().to_vec());
            labels.push(class);
        }
    }
    let filtered: BTreeMap<String, usize> = classes
        .iter()
        .cloned()
        .zip(class_counts(&labels, classes.len()))
        .collect();
    log_counts("filtered", &filtered);
    info!("Feature geometry: {}", options.geometry.as_str());

    let num_classes = classes.len();
    let (train_idx, test_idx) = stratified_split(&labels, num_classes, options.test_size, options.forest.seed);
    info!("Training samples: {}", train_idx.len());
    info!("Test samples: {}", test_idx.len());

    let x_train: Vec<Vec<f32>> = train_idx.iter().map(|&i| features[i].clone()).collect();
    let y_train: Vec<usize> = train_idx.iter().map(|&i| labels[i]).collect();
    let x_test: Vec<Vec<f32>> = test_idx.iter().map(|&i| features[i].clone()).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();

    info!("Training model ({} trees)...", options.forest.n_estimators);
    let forest = RandomForest::fit(&x_train, &y_train, num_classes, &options.forest)?;

    info!("Performing cross-validation...");
    // Reduced by the smallest class of the whole file, dropped classes included
    let raw_sizes: Vec<usize> = raw_counts.values().copied().collect();
    let folds = effective_folds(options.cv_folds, &raw_sizes);
    if folds != options.cv_folds {
        info!("Adjusting CV folds to {} due to small class sizes", folds);
    }
    let cv_scores = cross_val_accuracy(&x_train, &y_train, num_classes, &options.forest, folds)?;
    let (cv_mean, cv_std) = mean_std(&cv_scores);
    info!(
        "Cross-validation accuracy: {:.2}% (+/- {:.2}%)",
        cv_mean * 100.0,
        cv_std * 2.0 * 100.0
    );

    let y_pred = predict_all(&forest, &x_test)?;
    let test_accuracy = accuracy(&y_test, &y_pred);
    info!("Test set accuracy: {:.2}%", test_accuracy * 100.0);

    let report = ClassificationReport::new(&y_test, &y_pred, &classes);
    info!("Classification Report:\n{}", report);

    let train_accuracy = accuracy(&y_train, &predict_all(&forest, &x_train)?);
    info!("Train accuracy: {:.2}%", train_accuracy * 100.0);
    info!("Test accuracy: {:.2}%", test_accuracy * 100.0);
    info!("Overfitting gap: {:.2}%", (train_accuracy - test_accuracy) * 100.0);

    let training_report = TrainingReport {
        classes: classes.clone(),
        dropped,
        train_samples: train_idx.len(),
        test_samples: test_idx.len(),
        cv_scores,
        train_accuracy,
        test_accuracy,
        report,
    };

    if training_report.is_overfitting() {
        warn!("Model may be overfitting! Consider:");
        for advice in OVERFITTING_ADVICE {
            warn!("   - {}", advice);
        }
    }

    let model = ClassifierModel::new(classes, options.geometry, forest)?;
    model
        .save(&options.output)
        .with_context(|| format!("failed to save model to {}", options.output.display()))?;
    info!("Model saved as {}", options.output.display());

    Ok(training_report)
}

fn predict_all(forest: &RandomForest, features: &[Vec<f32>]) -> Result<Vec<usize>> {
    let predictions = features
        .iter()
        .map(|x| forest.predict(x))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(predictions)
}
