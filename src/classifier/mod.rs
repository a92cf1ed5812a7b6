//! Random forest sign classifier
//!
//! - CART trees on Gini impurity with bootstrap bagging
//! - Balanced class weighting and sqrt feature sampling
//! - Seeded, deterministic training
//! - bincode persistence with the feature layout embedded

pub mod error;
pub mod forest;
pub mod metrics;
pub mod model;
pub mod tree;
pub mod validation;

pub use error::{ClassifierError, Result};
pub use forest::{ForestParams, RandomForest};
pub use metrics::{accuracy, ClassificationReport};
pub use model::{ClassifierModel, RankedLabel};
pub use tree::{DecisionTree, TreeNode};
