//! Palm detector
//!
//! Single-shot detector over a fixed 2016-anchor grid. Each anchor regresses
//! a palm box plus seven keypoints, keypoint 0 being the wrist and keypoint 2
//! the base of the middle finger.

use std::sync::Arc;

use anyhow::{bail, Result};
use image::DynamicImage;

use super::pool::{ModelPool, ModelType};
use super::preprocess::{preprocess_for_palm, ResizeInfo, PALM_INPUT_SIZE};

/// Anchor count of the 192x192 palm model
pub const NUM_ANCHORS: usize = 2016;
/// Values per anchor: box (4) + 7 keypoints (14)
const NUM_COORDS: usize = 18;
const NUM_KEYPOINTS: usize = 7;
const SCORE_CLIP: f32 = 100.0;

/// A detected palm in original image pixels
#[derive(Debug, Clone)]
pub struct PalmDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub keypoints: [(f32, f32); NUM_KEYPOINTS],
}

impl PalmDetection {
    pub fn wrist(&self) -> (f32, f32) {
        self.keypoints[0]
    }

    pub fn middle_finger_base(&self) -> (f32, f32) {
        self.keypoints[2]
    }
}

pub struct PalmDetector {
    pool: Arc<ModelPool>,
    score_threshold: f32,
    nms_threshold: f32,
    anchors: Vec<(f32, f32)>,
}

impl PalmDetector {
    pub fn new(pool: Arc<ModelPool>, score_threshold: f32) -> Self {
        Self {
            pool,
            score_threshold,
            nms_threshold: 0.3,
            anchors: generate_anchors(),
        }
    }

    /// Detect palms, best first
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<PalmDetection>> {
        let (input, resize_info) = preprocess_for_palm(image);
        let outputs = self.pool.get_model(ModelType::PalmDetector).infer(&input)?;

        // Output order differs between exports, tell them apart by size
        let regressors = outputs.iter().find(|o| o.len() == NUM_ANCHORS * NUM_COORDS);
        let scores = outputs.iter().find(|o| o.len() == NUM_ANCHORS);
        let (Some(regressors), Some(scores)) = (regressors, scores) else {
            bail!(
                "unexpected palm detector outputs: {:?}",
                outputs.iter().map(|o| o.len()).collect::<Vec<_>>()
            );
        };

        let detections = decode(regressors, scores, &self.anchors, self.score_threshold, &resize_info);
        tracing::debug!("Palm detector kept {} candidates", detections.len());
        Ok(nms(detections, self.nms_threshold))
    }
}

/// Turn raw regressor and score outputs into palms above `score_threshold`
fn decode(
    regressors: &[f32],
    scores: &[f32],
    anchors: &[(f32, f32)],
    score_threshold: f32,
    resize_info: &ResizeInfo,
) -> Vec<PalmDetection> {
    let size = PALM_INPUT_SIZE.0 as f32;
    let mut detections = Vec::new();

    for (i, &(anchor_x, anchor_y)) in anchors.iter().enumerate() {
        let score = sigmoid(scores[i].clamp(-SCORE_CLIP, SCORE_CLIP));
        if score < score_threshold {
            continue;
        }

        let raw = &regressors[i * NUM_COORDS..(i + 1) * NUM_COORDS];

        // Offsets are in input pixels relative to the anchor center
        let to_original = |dx: f32, dy: f32| {
            resize_info.to_original(anchor_x * size + dx, anchor_y * size + dy)
        };

        let (cx, cy) = to_original(raw[0], raw[1]);
        let w = raw[2] / resize_info.scale;
        let h = raw[3] / resize_info.scale;

        let mut keypoints = [(0.0f32, 0.0f32); NUM_KEYPOINTS];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            *kp = to_original(raw[4 + k * 2], raw[5 + k * 2]);
        }

        detections.push(PalmDetection {
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
            score,
            keypoints,
        });
    }

    detections
}

/// Non-maximum suppression
fn nms(mut detections: Vec<PalmDetection>, iou_threshold: f32) -> Vec<PalmDetection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<PalmDetection> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|k| compute_iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }

    keep
}

/// Anchor centers, normalized to the input, in model output order.
///
/// Stride 8 gives a 24x24 grid with 2 anchors per cell, the three stride 16
/// layers share a 12x12 grid with 6 anchors per cell.
pub fn generate_anchors() -> Vec<(f32, f32)> {
    const LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];
    let input = PALM_INPUT_SIZE.0;

    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    for (stride, per_cell) in LAYERS {
        let grid = input.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let center = (
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                );
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }

    anchors
}

pub(super) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Compute intersection over union
fn compute_iou(a: &PalmDetection, b: &PalmDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);

    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);

    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palm(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> PalmDetection {
        PalmDetection {
            x1,
            y1,
            x2,
            y2,
            score,
            keypoints: [(0.0, 0.0); NUM_KEYPOINTS],
        }
    }

    #[test]
    fn test_anchor_grid() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);

        // First stride-8 cell, duplicated
        assert_eq!(anchors[0], (0.5 / 24.0, 0.5 / 24.0));
        assert_eq!(anchors[1], anchors[0]);
        // First stride-16 cell starts after 24*24*2 anchors
        assert_eq!(anchors[1152], (0.5 / 12.0, 0.5 / 12.0));
        assert_eq!(anchors[NUM_ANCHORS - 1], (11.5 / 12.0, 11.5 / 12.0));
    }

    #[test]
    fn test_iou_calculation() {
        let a = palm(0.0, 0.0, 10.0, 10.0, 0.9);
        let b = palm(5.0, 5.0, 15.0, 15.0, 0.8);

        let iou = compute_iou(&a, &b);
        // Intersection: 5x5 = 25, Union: 100 + 100 - 25 = 175
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
        assert_eq!(compute_iou(&a, &palm(20.0, 20.0, 30.0, 30.0, 0.5)), 0.0);
    }

    #[test]
    fn test_decode_maps_back_to_original() {
        let anchors = vec![(0.5, 0.5), (0.25, 0.25)];
        let mut regressors = vec![0.0f32; 2 * NUM_COORDS];
        // Box 48x48 shifted 12px right of the center anchor, wrist 24px below
        regressors[0] = 12.0;
        regressors[2] = 48.0;
        regressors[3] = 48.0;
        regressors[5] = 24.0;
        let scores = vec![5.0, -5.0];

        // 384x384 source halves everything
        let info = ResizeInfo::new((384, 384), PALM_INPUT_SIZE);
        let palms = decode(&regressors, &scores, &anchors, 0.5, &info);

        assert_eq!(palms.len(), 1);
        let p = &palms[0];
        assert!((p.x1 - 168.0).abs() < 1e-3);
        assert!((p.x2 - 264.0).abs() < 1e-3);
        assert!((p.y1 - 144.0).abs() < 1e-3);
        assert!((p.wrist().0 - 192.0).abs() < 1e-3);
        assert!((p.wrist().1 - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let palms = vec![
            palm(0.0, 0.0, 10.0, 10.0, 0.7),
            palm(1.0, 1.0, 11.0, 11.0, 0.9),
            palm(50.0, 50.0, 60.0, 60.0, 0.6),
        ];
        let kept = nms(palms, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.6);
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(SCORE_CLIP) > 0.999);
        assert!(sigmoid(-SCORE_CLIP) < 1e-6);
    }
}
