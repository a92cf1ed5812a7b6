//! REST API request/response data transfer objects

use serde::{Deserialize, Serialize};

use crate::classifier::RankedLabel;
use crate::service::PredictOutcome;

/// Predict response
///
/// `prediction` is always present (null when nothing is recognized), the
/// other fields only when they apply.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_predictions: Option<Vec<RankedLabelDto>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankedLabelDto {
    pub label: String,
    pub confidence: f32,
}

impl From<RankedLabel> for RankedLabelDto {
    fn from(r: RankedLabel) -> Self {
        Self {
            label: r.label,
            confidence: r.confidence,
        }
    }
}

impl From<PredictOutcome> for PredictResponse {
    fn from(outcome: PredictOutcome) -> Self {
        let ranked = |top: Vec<RankedLabel>| -> Option<Vec<RankedLabelDto>> {
            Some(top.into_iter().map(RankedLabelDto::from).collect())
        };

        match outcome {
            PredictOutcome::NoHand => Self {
                prediction: None,
                confidence: None,
                message: Some("no hand detected".to_string()),
                top_predictions: None,
            },
            PredictOutcome::LowConfidence { confidence, top } => Self {
                prediction: None,
                confidence: None,
                message: Some(format!("low confidence ({:.2})", confidence)),
                top_predictions: ranked(top),
            },
            PredictOutcome::Prediction { label, confidence, top } => Self {
                prediction: Some(label),
                confidence: Some(confidence),
                message: None,
                top_predictions: ranked(top),
            },
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Served at `/` when no frontend is deployed
#[derive(Debug, Serialize)]
pub struct ApiInfoResponse {
    pub message: &'static str,
    pub docs: &'static str,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}
