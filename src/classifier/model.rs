//! Classifier artifact: class names, feature layout, geometry and forest

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ClassifierError, Result};
use super::forest::RandomForest;
use crate::features::{feature_columns, FeatureGeometry, FeatureVector};

/// A ranked (label, probability) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLabel {
    pub label: String,
    pub confidence: f32,
}

/// The persisted sign classifier.
///
/// Besides the forest it records the class names, the feature columns it
/// was fitted on and the feature geometry applied before fitting, so the
/// serving path reproduces exactly what the trainer saw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierModel {
    classes: Vec<String>,
    feature_names: Vec<String>,
    geometry: FeatureGeometry,
    forest: RandomForest,
}

impl ClassifierModel {
    pub fn new(
        classes: Vec<String>,
        geometry: FeatureGeometry,
        forest: RandomForest,
    ) -> Result<Self> {
        let model = Self {
            classes,
            feature_names: feature_columns(),
            geometry,
            forest,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load a model from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Save the model to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.feature_names != feature_columns() {
            return Err(ClassifierError::FeatureColumnMismatch);
        }
        if self.forest.num_features() != self.feature_names.len() {
            return Err(ClassifierError::InvalidFeatureSize {
                expected: self.feature_names.len(),
                actual: self.forest.num_features(),
            });
        }
        if self.forest.num_classes() != self.classes.len() {
            return Err(ClassifierError::InvalidModel(format!(
                "forest predicts {} classes but {} labels are stored",
                self.forest.num_classes(),
                self.classes.len()
            )));
        }
        Ok(())
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn geometry(&self) -> FeatureGeometry {
        self.geometry
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Class probabilities for raw detector features, in `classes()` order.
    pub fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f32>> {
        let prepared = self.geometry.apply(features);
        self.forest.predict_proba(prepared.as_slice())
    }

    /// The `k` most probable labels, highest first.
    ///
    /// Ties keep class order, so the first entry is always the argmax.
    pub fn rank(&self, probs: &[f32], k: usize) -> Vec<RankedLabel> {
        let mut order: Vec<usize> = (0..probs.len().min(self.classes.len())).collect();
        order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
        order
            .into_iter()
            .take(k)
            .map(|i| RankedLabel {
                label: self.classes[i].clone(),
                confidence: probs[i],
            })
            .collect()
    }
}
