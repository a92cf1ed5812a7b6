//! Service layer types

use thiserror::Error;

use crate::classifier::RankedLabel;

/// Result of classifying one frame
#[derive(Debug, Clone, PartialEq)]
pub enum PredictOutcome {
    /// The extractor found no hand
    NoHand,
    /// A hand was found but the best class scored below the threshold
    LowConfidence {
        confidence: f32,
        top: Vec<RankedLabel>,
    },
    Prediction {
        label: String,
        confidence: f32,
        top: Vec<RankedLabel>,
    },
}

impl PredictOutcome {
    pub fn label(&self) -> Option<&str> {
        match self {
            PredictOutcome::Prediction { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Request failures, split by who is at fault
#[derive(Error, Debug)]
pub enum PredictError {
    /// The uploaded bytes are not a decodable image
    #[error("invalid image")]
    InvalidImage,

    /// Extraction or classification failed
    #[error("{0}")]
    Internal(String),
}

impl From<anyhow::Error> for PredictError {
    fn from(e: anyhow::Error) -> Self {
        PredictError::Internal(format!("{:#}", e))
    }
}
