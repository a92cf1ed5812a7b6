//! Sign Service - per-request recognition logic
//!
//! Decodes a frame, extracts hand landmarks, encodes them and classifies
//! the sign against the loaded model.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::classifier::ClassifierModel;
use crate::config::InferenceConfig;
use crate::engine::{decode_image, LandmarkExtractor};
use crate::features::encode;

use super::types::*;

/// Sign recognition service
///
/// Holds the shared, read-only extractor and classifier for the lifetime
/// of the server.
pub struct SignService<E: LandmarkExtractor> {
    extractor: Arc<E>,
    model: Arc<ClassifierModel>,
    confidence_threshold: f32,
    top_k: usize,
}

impl<E: LandmarkExtractor> SignService<E> {
    pub fn new(extractor: E, model: ClassifierModel, config: &InferenceConfig) -> Self {
        Self {
            extractor: Arc::new(extractor),
            model: Arc::new(model),
            confidence_threshold: config.confidence_threshold,
            top_k: config.top_k,
        }
    }

    /// Classify one uploaded frame
    pub async fn predict(&self, image_data: Vec<u8>) -> Result<PredictOutcome, PredictError> {
        let start = Instant::now();

        // Run extraction and classification in blocking task
        let extractor = self.extractor.clone();
        let model = self.model.clone();
        let threshold = self.confidence_threshold;
        let top_k = self.top_k;

        let outcome = tokio::task::spawn_blocking(move || {
            classify_frame(extractor.as_ref(), &model, &image_data, threshold, top_k)
        })
        .await
        .map_err(|e| PredictError::Internal(e.to_string()))??;

        debug!("Frame classified in {:?}: {:?}", start.elapsed(), outcome.label());
        Ok(outcome)
    }
}

/// Synchronous recognition of one encoded image.
///
/// The top probability is compared against `threshold` inclusively.
pub fn classify_frame<E: LandmarkExtractor + ?Sized>(
    extractor: &E,
    model: &ClassifierModel,
    image_data: &[u8],
    threshold: f32,
    top_k: usize,
) -> Result<PredictOutcome, PredictError> {
    let image = decode_image(image_data).map_err(|_| PredictError::InvalidImage)?;

    let Some(landmarks) = extractor.extract(&image)? else {
        return Ok(PredictOutcome::NoHand);
    };

    let features = encode(&landmarks);
    let probs = model
        .predict_proba(&features)
        .map_err(|e| PredictError::Internal(e.to_string()))?;

    let top = model.rank(&probs, top_k.max(1));
    let Some(best) = top.first() else {
        return Err(PredictError::Internal("model has no classes".to_string()));
    };

    if best.confidence < threshold {
        return Ok(PredictOutcome::LowConfidence {
            confidence: best.confidence,
            top,
        });
    }

    Ok(PredictOutcome::Prediction {
        label: best.label.clone(),
        confidence: best.confidence,
        top,
    })
}
