//! Hand landmark regression on a rotated crop around a detected palm

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::Arc;

use anyhow::{bail, Result};
use image::RgbImage;
use tracing::debug;

use super::palm::{sigmoid, PalmDetection};
use super::pool::{ModelPool, ModelType};
use super::preprocess::{image_to_nchw, warp_rotated_rect, RotatedRect, LANDMARK_INPUT_SIZE};
use crate::features::{Landmark, LandmarkSet, NUM_LANDMARKS};

/// Output order of the hand landmark model: screen landmarks, presence
/// logit, handedness logit, world landmarks
const SCREEN_LANDMARKS_OUTPUT: usize = 0;
const PRESENCE_OUTPUT: usize = 1;

/// Crop enlargement relative to the palm box
const ROI_SCALE: f32 = 2.6;
/// Shift toward the fingers, in palm box heights
const ROI_SHIFT_Y: f32 = -0.5;

pub struct HandLandmarker {
    pool: Arc<ModelPool>,
    presence_threshold: f32,
}

impl HandLandmarker {
    pub fn new(pool: Arc<ModelPool>, presence_threshold: f32) -> Self {
        Self {
            pool,
            presence_threshold,
        }
    }

    /// Regress 21 landmarks inside `roi`.
    ///
    /// Returns `None` when the model reports no hand in the crop.
    pub fn detect(&self, image: &RgbImage, roi: &RotatedRect) -> Result<Option<LandmarkSet>> {
        let (crop_w, crop_h) = LANDMARK_INPUT_SIZE;
        let crop = warp_rotated_rect(image, roi, crop_w, crop_h);
        let input = image_to_nchw(&crop);

        let outputs = self.pool.get_model(ModelType::HandLandmark).infer(&input)?;
        let (raw, presence) = read_outputs(&outputs)?;

        debug!("Hand presence score {:.3}", presence);
        if presence < self.presence_threshold {
            return Ok(None);
        }

        Ok(Some(project_landmarks(raw, roi, image.width(), image.height())))
    }
}

/// Rotated square crop around the whole hand, derived from a palm detection.
///
/// The rotation aligns the wrist to middle finger direction with crop "up".
pub fn roi_from_palm(palm: &PalmDetection) -> RotatedRect {
    let (x0, y0) = palm.wrist();
    let (x1, y1) = palm.middle_finger_base();
    let rotation = normalize_radians(FRAC_PI_2 - (-(y1 - y0)).atan2(x1 - x0));

    let width = palm.x2 - palm.x1;
    let height = palm.y2 - palm.y1;
    let (sin, cos) = rotation.sin_cos();

    let center_x = (palm.x1 + palm.x2) / 2.0 - height * ROI_SHIFT_Y * sin;
    let center_y = (palm.y1 + palm.y2) / 2.0 + height * ROI_SHIFT_Y * cos;
    let side = width.max(height) * ROI_SCALE;

    RotatedRect {
        center_x,
        center_y,
        width: side,
        height: side,
        rotation,
    }
}

/// Map crop-pixel landmarks back to coordinates normalized by the image size.
///
/// Points outside the frame are kept as is, so values may fall outside [0, 1].
pub fn project_landmarks(raw: &[f32], roi: &RotatedRect, width: u32, height: u32) -> LandmarkSet {
    let (crop_w, crop_h) = LANDMARK_INPUT_SIZE;
    let mut points = [Landmark::default(); NUM_LANDMARKS];

    for (i, point) in points.iter_mut().enumerate() {
        let u = raw[i * 3] / crop_w as f32;
        let v = raw[i * 3 + 1] / crop_h as f32;
        let (x, y) = roi.to_image(u, v);
        *point = Landmark {
            x: x / width as f32,
            y: y / height as f32,
        };
    }

    LandmarkSet::new(points)
}

fn normalize_radians(angle: f32) -> f32 {
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

/// Screen landmarks and hand presence probability from the model outputs.
///
/// The presence output is a logit.
fn read_outputs(outputs: &[Vec<f32>]) -> Result<(&[f32], f32)> {
    let sizes = || outputs.iter().map(|o| o.len()).collect::<Vec<_>>();

    let raw = match outputs.get(SCREEN_LANDMARKS_OUTPUT) {
        Some(o) if o.len() == NUM_LANDMARKS * 3 => o.as_slice(),
        _ => bail!("unexpected hand landmark outputs: {:?}", sizes()),
    };
    let presence = match outputs.get(PRESENCE_OUTPUT) {
        Some(o) if o.len() == 1 => sigmoid(o[0]),
        _ => bail!("unexpected hand presence output: {:?}", sizes()),
    };

    Ok((raw, presence))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palm_with(wrist: (f32, f32), middle: (f32, f32)) -> PalmDetection {
        let mut keypoints = [(0.0, 0.0); 7];
        keypoints[0] = wrist;
        keypoints[2] = middle;
        PalmDetection {
            x1: 80.0,
            y1: 80.0,
            x2: 120.0,
            y2: 120.0,
            score: 0.9,
            keypoints,
        }
    }

    #[test]
    fn test_roi_upright_hand() {
        let roi = roi_from_palm(&palm_with((100.0, 120.0), (100.0, 85.0)));
        assert!(roi.rotation.abs() < 1e-5);
        assert!((roi.center_x - 100.0).abs() < 1e-3);
        // Shifted half a box height toward the fingers
        assert!((roi.center_y - 80.0).abs() < 1e-3);
        assert!((roi.width - 104.0).abs() < 1e-3);
        assert_eq!(roi.width, roi.height);
    }

    #[test]
    fn test_roi_hand_pointing_right() {
        let roi = roi_from_palm(&palm_with((80.0, 100.0), (115.0, 100.0)));
        assert!((roi.rotation - FRAC_PI_2).abs() < 1e-5);
        assert!((roi.center_x - 120.0).abs() < 1e-3);
        assert!((roi.center_y - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_project_landmarks() {
        let roi = RotatedRect {
            center_x: 100.0,
            center_y: 50.0,
            width: 112.0,
            height: 112.0,
            rotation: 0.0,
        };
        let mut raw = vec![0.0f32; NUM_LANDMARKS * 3];
        // Landmark 0 at crop center, landmark 1 at the crop's top-left corner
        raw[0] = 112.0;
        raw[1] = 112.0;
        let set = project_landmarks(&raw, &roi, 200, 100);

        let wrist = set.wrist();
        assert!((wrist.x - 0.5).abs() < 1e-5);
        assert!((wrist.y - 0.5).abs() < 1e-5);
        let corner = set.points()[1];
        assert!((corner.x - 44.0 / 200.0).abs() < 1e-5);
        assert!((corner.y - (-6.0 / 100.0)).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_radians() {
        assert!((normalize_radians(3.0 * PI / 2.0) + FRAC_PI_2).abs() < 1e-5);
        assert!((normalize_radians(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_presence_logit_in_unit_range() {
        let outputs = vec![vec![10.0; NUM_LANDMARKS * 3], vec![0.3], vec![0.9], vec![0.0; NUM_LANDMARKS * 3]];
        let (raw, presence) = read_outputs(&outputs).unwrap();
        assert_eq!(raw[0], 10.0);
        // sigmoid(0.3) clears the 0.5 gate
        assert!((presence - 0.5744).abs() < 1e-3);
        assert!(presence >= 0.5);
    }

    #[test]
    fn test_presence_logit_extremes() {
        let confident = vec![vec![0.0; NUM_LANDMARKS * 3], vec![4.0]];
        assert!(read_outputs(&confident).unwrap().1 > 0.98);

        let absent = vec![vec![0.0; NUM_LANDMARKS * 3], vec![-4.0]];
        assert!(read_outputs(&absent).unwrap().1 < 0.02);
    }

    #[test]
    fn test_outputs_read_by_position() {
        // World landmarks at index 3 are never taken as screen landmarks
        let outputs = vec![vec![1.0; NUM_LANDMARKS * 3], vec![2.0], vec![-9.0], vec![7.0; NUM_LANDMARKS * 3]];
        let (raw, presence) = read_outputs(&outputs).unwrap();
        assert!(raw.iter().all(|&v| v == 1.0));
        assert!(presence > 0.88);
    }

    #[test]
    fn test_missing_presence_output() {
        assert!(read_outputs(&[vec![0.0; NUM_LANDMARKS * 3]]).is_err());
        assert!(read_outputs(&[vec![0.0; 5], vec![1.0]]).is_err());
    }
}
