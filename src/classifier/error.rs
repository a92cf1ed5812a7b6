//! Classifier errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("Feature columns do not match the expected x0,y0,...,x20,y20 layout")]
    FeatureColumnMismatch,

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Cannot train on an empty dataset")]
    EmptyTrainingSet,
}

pub type Result<T> = std::result::Result<T, ClassifierError>;
