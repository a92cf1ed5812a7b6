//! Image to landmarks: the seam between the hand models and everything else

use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use tracing::debug;

use super::landmark::{roi_from_palm, HandLandmarker};
use super::palm::PalmDetector;
use super::pool::ModelPool;
use crate::config::InferenceConfig;
use crate::features::LandmarkSet;

/// Anything that can locate one hand in an image.
///
/// Implementations must behave like a static-image detector: every call is
/// independent and at most one hand is reported.
pub trait LandmarkExtractor: Send + Sync + 'static {
    /// `Ok(None)` when no hand is found
    fn extract(&self, image: &DynamicImage) -> Result<Option<LandmarkSet>>;
}

/// Two-stage hand tracker: palm detection followed by landmark regression
pub struct HandTracker {
    palm_detector: PalmDetector,
    landmarker: HandLandmarker,
}

impl HandTracker {
    pub fn new(pool: Arc<ModelPool>, config: &InferenceConfig) -> Self {
        Self {
            palm_detector: PalmDetector::new(pool.clone(), config.min_detection_confidence),
            landmarker: HandLandmarker::new(pool, config.min_tracking_confidence),
        }
    }
}

impl LandmarkExtractor for HandTracker {
    fn extract(&self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        let palms = self.palm_detector.detect(image)?;
        let Some(palm) = palms.first() else {
            return Ok(None);
        };
        debug!("Best palm score {:.3} of {} palms", palm.score, palms.len());

        let roi = roi_from_palm(palm);
        self.landmarker.detect(&image.to_rgb8(), &roi)
    }
}

impl<E: LandmarkExtractor> LandmarkExtractor for Arc<E> {
    fn extract(&self, image: &DynamicImage) -> Result<Option<LandmarkSet>> {
        (**self).extract(image)
    }
}
