//! CART decision tree over weighted samples

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of candidate features drawn at every split.
    pub max_features: usize,
}

/// A node in the classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split node. Samples with `value <= threshold` go left.
    Split {
        feature: u16,
        threshold: f32,
        left: u32,
        right: u32,
    },
    /// Leaf node holding the non-zero entries of the class distribution.
    Leaf { distribution: Vec<(u16, f32)> },
}

/// Training rows seen by one tree: features, class ids and per-row weights.
///
/// Rows with zero weight (not drawn by the bootstrap) are excluded before
/// the tree is grown.
pub struct TrainingView<'a> {
    pub features: &'a [Vec<f32>],
    pub labels: &'a [usize],
    pub weights: &'a [f32],
    pub num_classes: usize,
}

/// A single CART classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Create a tree from prebuilt nodes. Node 0 is the root.
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Grow a tree on the rows of `view` that carry a positive weight.
    pub fn fit(view: &TrainingView<'_>, params: &TreeParams, rng: &mut StdRng) -> Self {
        let indices: Vec<usize> = (0..view.labels.len())
            .filter(|&i| view.weights[i] > 0.0)
            .collect();

        let mut builder = TreeBuilder {
            view,
            params,
            rng,
            nodes: Vec::new(),
        };

        if indices.is_empty() {
            builder.nodes.push(TreeNode::Leaf {
                distribution: Vec::new(),
            });
        } else {
            builder.grow(indices, 0);
        }

        Self {
            nodes: builder.nodes,
        }
    }

    /// Traverse the tree and return the reached leaf distribution.
    pub fn leaf_for(&self, features: &[f32]) -> &[(u16, f32)] {
        let mut node_idx = 0usize;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if features[*feature as usize] <= *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                TreeNode::Leaf { distribution } => return distribution,
            }
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, node_idx: usize) -> usize {
        match &self.nodes[node_idx] {
            TreeNode::Split { left, right, .. } => {
                1 + self
                    .depth_from(*left as usize)
                    .max(self.depth_from(*right as usize))
            }
            TreeNode::Leaf { .. } => 1,
        }
    }
}

struct TreeBuilder<'v, 'a, 'p, 'r> {
    view: &'v TrainingView<'a>,
    params: &'p TreeParams,
    rng: &'r mut StdRng,
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f32,
    score: f64,
}

impl TreeBuilder<'_, '_, '_, '_> {
    /// Grow the subtree for `indices` and return its node id.
    fn grow(&mut self, indices: Vec<usize>, depth: usize) -> u32 {
        let node_id = self.nodes.len() as u32;
        let class_weights = self.class_weights(&indices);
        let total: f64 = class_weights.iter().sum();

        let is_pure = class_weights.iter().filter(|w| **w > 0.0).count() <= 1;
        let too_small = indices.len() < self.params.min_samples_split
            || indices.len() < 2 * self.params.min_samples_leaf;

        if depth >= self.params.max_depth || too_small || is_pure {
            self.nodes.push(leaf(&class_weights, total));
            return node_id;
        }

        let Some(split) = self.find_split(&indices, total) else {
            self.nodes.push(leaf(&class_weights, total));
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.view.features[i][split.feature] <= split.threshold);

        // Placeholder, patched once both children exist
        self.nodes.push(TreeNode::Split {
            feature: split.feature as u16,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });

        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);

        if let TreeNode::Split {
            left: l, right: r, ..
        } = &mut self.nodes[node_id as usize]
        {
            *l = left;
            *r = right;
        }

        node_id
    }

    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut weights = vec![0.0f64; self.view.num_classes];
        for &i in indices {
            weights[self.view.labels[i]] += self.view.weights[i] as f64;
        }
        weights
    }

    /// Best Gini split over a random subset of features.
    fn find_split(&mut self, indices: &[usize], total: f64) -> Option<BestSplit> {
        let num_features = self.view.features[indices[0]].len();
        let mut candidates: Vec<usize> = (0..num_features).collect();
        let take = self.params.max_features.clamp(1, num_features);
        let (chosen, _) = candidates.partial_shuffle(&mut *self.rng, take);

        let min_leaf = self.params.min_samples_leaf.max(1);
        let num_classes = self.view.num_classes;
        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f32, usize, f64)> = Vec::with_capacity(indices.len());

        for &feature in chosen.iter() {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| {
                (
                    self.view.features[i][feature],
                    self.view.labels[i],
                    self.view.weights[i] as f64,
                )
            }));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            if sorted[0].0 == sorted[sorted.len() - 1].0 {
                continue;
            }

            let mut left = vec![0.0f64; num_classes];
            let mut left_total = 0.0f64;
            let mut right: Vec<f64> = vec![0.0f64; num_classes];
            for &(_, class, w) in &sorted {
                right[class] += w;
            }
            let mut right_total = total;

            for pos in 0..sorted.len() - 1 {
                let (value, class, w) = sorted[pos];
                left[class] += w;
                right[class] -= w;
                left_total += w;
                right_total -= w;

                let next = sorted[pos + 1].0;
                if value == next {
                    continue;
                }
                let left_count = pos + 1;
                let right_count = sorted.len() - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }

                let score = left_total * gini(&left, left_total)
                    + right_total * gini(&right, right_total);

                if best.as_ref().map_or(true, |b| score < b.score) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        score,
                    });
                }
            }
        }

        best
    }
}

fn gini(class_weights: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let sum_sq: f64 = class_weights.iter().map(|w| (w / total) * (w / total)).sum();
    1.0 - sum_sq
}

fn leaf(class_weights: &[f64], total: f64) -> TreeNode {
    let distribution = if total > 0.0 {
        class_weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(c, w)| (c as u16, (w / total) as f32))
            .collect()
    } else {
        Vec::new()
    };
    TreeNode::Leaf { distribution }
}
