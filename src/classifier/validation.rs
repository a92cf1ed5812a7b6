//! Stratified splitting and cross-validation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use super::error::Result;
use super::forest::{ForestParams, RandomForest};
use super::metrics::accuracy;

/// Number of samples per class id
pub fn class_counts(labels: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for &l in labels {
        counts[l] += 1;
    }
    counts
}

fn indices_by_class(labels: &[usize], num_classes: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut by_class = vec![Vec::new(); num_classes];
    for (i, &l) in labels.iter().enumerate() {
        by_class[l].push(i);
    }
    for members in by_class.iter_mut() {
        members.shuffle(rng);
    }
    by_class
}

/// Split sample indices into (train, test) keeping class proportions.
///
/// Every class with at least two samples contributes at least one sample
/// to each side.
pub fn stratified_split(
    labels: &[usize],
    num_classes: usize,
    test_size: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for members in indices_by_class(labels, num_classes, &mut rng) {
        let n = members.len();
        if n == 0 {
            continue;
        }
        let mut n_test = (n as f64 * test_size).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    (train, test)
}

/// Stratified k-fold: returns (train, validation) index pairs.
pub fn stratified_kfold(
    labels: &[usize],
    num_classes: usize,
    folds: usize,
    seed: u64,
) -> Vec<(Vec<usize>, Vec<usize>)> {
    let folds = folds.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut assignment = vec![0usize; labels.len()];

    // Deal each class round-robin, continuing where the previous class stopped
    let mut next_fold = 0usize;
    for members in indices_by_class(labels, num_classes, &mut rng) {
        for i in members {
            assignment[i] = next_fold;
            next_fold = (next_fold + 1) % folds;
        }
    }

    (0..folds)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| assignment[i] == fold);
            (train, validation)
        })
        .collect()
}

/// Fold count used for cross-validation: the requested count, reduced to
/// the smallest class size (but at least 2) when some class is smaller.
pub fn effective_folds(requested: usize, counts: &[usize]) -> usize {
    let smallest = counts.iter().copied().filter(|c| *c > 0).min().unwrap_or(0);
    if smallest < requested {
        smallest.max(2)
    } else {
        requested
    }
}

/// Accuracy of a freshly fitted forest on each stratified fold.
pub fn cross_val_accuracy(
    features: &[Vec<f32>],
    labels: &[usize],
    num_classes: usize,
    params: &ForestParams,
    folds: usize,
) -> Result<Vec<f64>> {
    let splits = stratified_kfold(labels, num_classes, folds, params.seed);
    let mut scores = Vec::with_capacity(splits.len());

    for (fold, (train, validation)) in splits.iter().enumerate() {
        let x_train: Vec<Vec<f32>> = train.iter().map(|&i| features[i].clone()).collect();
        let y_train: Vec<usize> = train.iter().map(|&i| labels[i]).collect();

        let forest = RandomForest::fit(&x_train, &y_train, num_classes, params)?;

        let mut y_true = Vec::with_capacity(validation.len());
        let mut y_pred = Vec::with_capacity(validation.len());
        for &i in validation {
            y_true.push(labels[i]);
            y_pred.push(forest.predict(&features[i])?);
        }

        let score = accuracy(&y_true, &y_pred);
        info!("Fold {}/{}: accuracy {:.4}", fold + 1, splits.len(), score);
        scores.push(score);
    }

    Ok(scores)
}
