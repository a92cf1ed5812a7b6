//! Bagged random forest
//!
//! Trees are grown on seeded bootstrap samples and their leaf distributions
//! are averaged at prediction time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ClassifierError, Result};
use super::tree::{DecisionTree, TrainingView, TreeParams};

/// Random forest hyperparameters.
///
/// Every tree draws a bootstrap sample, splits look at `sqrt(n_features)`
/// candidates and classes are weighted `n_samples / (n_classes * count)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 20,
            min_samples_split: 10,
            min_samples_leaf: 5,
            seed: 42,
        }
    }
}

/// An ensemble of bagged classification trees.
///
/// Class probabilities are the mean of the leaf distributions reached in
/// every tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    num_classes: usize,
    num_features: usize,
}

impl RandomForest {
    pub fn new(trees: Vec<DecisionTree>, num_classes: usize, num_features: usize) -> Self {
        Self {
            trees,
            num_classes,
            num_features,
        }
    }

    /// Fit a forest on `features` (one row per sample) and class ids `labels`.
    pub fn fit(
        features: &[Vec<f32>],
        labels: &[usize],
        num_classes: usize,
        params: &ForestParams,
    ) -> Result<Self> {
        if features.is_empty() || features.len() != labels.len() {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        let num_features = features[0].len();
        if let Some(row) = features.iter().find(|r| r.len() != num_features) {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: num_features,
                actual: row.len(),
            });
        }
        if let Some(&bad) = labels.iter().find(|&&l| l >= num_classes) {
            return Err(ClassifierError::InvalidModel(format!(
                "label id {} out of range for {} classes",
                bad, num_classes
            )));
        }

        let class_weights = balanced_weights(labels, num_classes);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: sqrt_features(num_features),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = labels.len();
        let mut trees = Vec::with_capacity(params.n_estimators);

        for t in 0..params.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen());

            let mut weights = vec![0.0f32; n];
            for _ in 0..n {
                weights[tree_rng.gen_range(0..n)] += 1.0;
            }
            for (w, &label) in weights.iter_mut().zip(labels) {
                *w *= class_weights[label];
            }

            let view = TrainingView {
                features,
                labels,
                weights: &weights,
                num_classes,
            };
            let tree = DecisionTree::fit(&view, &tree_params, &mut tree_rng);
            debug!("Tree {} grown: {} nodes, depth {}", t, tree.num_nodes(), tree.depth());
            trees.push(tree);
        }

        Ok(Self {
            trees,
            num_classes,
            num_features,
        })
    }

    /// Mean class distribution over all trees.
    pub fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        if features.len() != self.num_features {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.num_features,
                actual: features.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(ClassifierError::InvalidModel("forest has no trees".to_string()));
        }

        let mut probs = vec![0.0f32; self.num_classes];
        for tree in &self.trees {
            for &(class, p) in tree.leaf_for(features) {
                probs[class as usize] += p;
            }
        }
        let n = self.trees.len() as f32;
        probs.iter_mut().for_each(|p| *p /= n);
        Ok(probs)
    }

    /// Most probable class id (the first one on ties).
    pub fn predict(&self, features: &[f32]) -> Result<usize> {
        let probs = self.predict_proba(features)?;
        Ok(argmax(&probs))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }
}

/// Index of the first maximum
fn argmax(x: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in x.iter().enumerate() {
        if *v > x[best] {
            best = i;
        }
    }
    best
}

fn sqrt_features(num_features: usize) -> usize {
    ((num_features as f64).sqrt() as usize).clamp(1, num_features.max(1))
}

/// `n_samples / (n_classes * count(class))`, zero for absent classes
fn balanced_weights(labels: &[usize], num_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; num_classes];
    for &l in labels {
        counts[l] += 1;
    }
    let present = counts.iter().filter(|c| **c > 0).count() as f32;
    let n = labels.len() as f32;
    counts
        .iter()
        .map(|&c| if c > 0 { n / (present * c as f32) } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::tree::TreeNode;

    fn blobs() -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3usize {
            for i in 0..30 {
                let jitter = (i % 7) as f32 * 0.01;
                features.push(vec![class as f32 + jitter, 1.0 - class as f32 * 0.3 + jitter, jitter]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_fit_and_predict_blobs() {
        let (features, labels) = blobs();
        let forest = RandomForest::fit(&features, &labels, 3, &small_params()).unwrap();

        assert_eq!(forest.num_trees(), 15);
        assert_eq!(forest.predict(&[0.02, 1.02, 0.02]).unwrap(), 0);
        assert_eq!(forest.predict(&[1.03, 0.73, 0.03]).unwrap(), 1);
        assert_eq!(forest.predict(&[2.01, 0.41, 0.01]).unwrap(), 2);

        let probs = forest.predict_proba(&[1.0, 0.7, 0.0]).unwrap();
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (features, labels) = blobs();
        let a = RandomForest::fit(&features, &labels, 3, &small_params()).unwrap();
        let b = RandomForest::fit(&features, &labels, 3, &small_params()).unwrap();

        for row in &features {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn test_rejects_wrong_feature_size() {
        let (features, labels) = blobs();
        let forest = RandomForest::fit(&features, &labels, 3, &small_params()).unwrap();
        let err = forest.predict_proba(&[0.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            ClassifierError::InvalidFeatureSize { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_balanced_weights() {
        let labels = vec![0, 0, 0, 1];
        let w = balanced_weights(&labels, 3);
        assert!((w[0] - 4.0 / 6.0).abs() < 1e-6);
        assert!((w[1] - 2.0).abs() < 1e-6);
        assert_eq!(w[2], 0.0);
    }

    #[test]
    fn test_manual_forest_averages_leaves() {
        let trees = vec![
            DecisionTree::new(vec![TreeNode::Leaf {
                distribution: vec![(0, 1.0)],
            }]),
            DecisionTree::new(vec![TreeNode::Leaf {
                distribution: vec![(0, 0.5), (1, 0.5)],
            }]),
        ];
        let forest = RandomForest::new(trees, 2, 1);
        let probs = forest.predict_proba(&[0.0]).unwrap();
        assert!((probs[0] - 0.75).abs() < 1e-6);
        assert!((probs[1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[1.0, 5.0, 3.0, 2.0]), 1);
    }

    #[test]
    fn test_sqrt_feature_sampling() {
        assert_eq!(sqrt_features(42), 6);
        assert_eq!(sqrt_features(3), 1);
        assert_eq!(sqrt_features(0), 1);
    }
}
