//! Hand landmark feature encoding
//!
//! The 42-column layout defined here is shared by the dataset builder, the
//! trainer and the inference service. The classifier artifact stores the
//! column list it was fitted on and is rejected at load time if it differs.

use serde::{Deserialize, Serialize};

/// Number of keypoints produced by the hand landmark model
pub const NUM_LANDMARKS: usize = 21;

/// Length of the flattened (x, y) feature vector
pub const NUM_FEATURES: usize = NUM_LANDMARKS * 2;

/// Name of the label column in the training CSV
pub const LABEL_COLUMN: &str = "label";

pub const WRIST: usize = 0;

/// A single landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The 21 landmarks of one detected hand
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Landmark; NUM_LANDMARKS],
}

impl LandmarkSet {
    pub fn new(points: [Landmark; NUM_LANDMARKS]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.points
    }

    pub fn wrist(&self) -> Landmark {
        self.points[WRIST]
    }
}

/// Geometry applied to raw landmarks before they reach the classifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGeometry {
    /// Normalized image coordinates as returned by the detector
    #[default]
    Raw,
    /// Coordinates relative to the wrist (landmark 0)
    WristRelative,
}

impl FeatureGeometry {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureGeometry::Raw => "raw",
            FeatureGeometry::WristRelative => "wrist_relative",
        }
    }

    /// Apply this geometry to an already encoded feature vector
    pub fn apply(&self, features: &FeatureVector) -> FeatureVector {
        match self {
            FeatureGeometry::Raw => features.clone(),
            FeatureGeometry::WristRelative => encode(&normalize_to_wrist(&features.landmarks())),
        }
    }
}

/// Ordered x0,y0,...,x20,y20 feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; NUM_FEATURES],
}

impl FeatureVector {
    pub fn from_values(values: [f32; NUM_FEATURES]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Inverse of [`encode`]
    pub fn landmarks(&self) -> LandmarkSet {
        let mut points = [Landmark::default(); NUM_LANDMARKS];
        for (point, pair) in points.iter_mut().zip(self.values.chunks_exact(2)) {
            *point = Landmark::new(pair[0], pair[1]);
        }
        LandmarkSet::new(points)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Flatten a landmark set in the canonical column order
pub fn encode(landmarks: &LandmarkSet) -> FeatureVector {
    let mut values = [0.0f32; NUM_FEATURES];
    for (i, lm) in landmarks.points().iter().enumerate() {
        values[i * 2] = lm.x;
        values[i * 2 + 1] = lm.y;
    }
    FeatureVector { values }
}

/// Landmarks expressed relative to the wrist
pub fn normalize_to_wrist(landmarks: &LandmarkSet) -> LandmarkSet {
    let wrist = landmarks.wrist();
    let mut points = *landmarks.points();
    for lm in points.iter_mut() {
        lm.x -= wrist.x;
        lm.y -= wrist.y;
    }
    LandmarkSet::new(points)
}

/// Canonical feature column names: x0, y0, ..., x20, y20
pub fn feature_columns() -> Vec<String> {
    (0..NUM_LANDMARKS)
        .flat_map(|i| [format!("x{}", i), format!("y{}", i)])
        .collect()
}

/// Full CSV header: the feature columns followed by `label`
pub fn csv_header() -> Vec<String> {
    let mut header = feature_columns();
    header.push(LABEL_COLUMN.to_string());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> LandmarkSet {
        let mut points = [Landmark::default(); NUM_LANDMARKS];
        for (i, p) in points.iter_mut().enumerate() {
            *p = Landmark::new(0.1 + i as f32 * 0.01, 0.5 + i as f32 * 0.02);
        }
        LandmarkSet::new(points)
    }

    #[test]
    fn test_column_order() {
        let cols = feature_columns();
        assert_eq!(cols.len(), NUM_FEATURES);
        assert_eq!(cols[0], "x0");
        assert_eq!(cols[1], "y0");
        assert_eq!(cols[2], "x1");
        assert_eq!(cols[41], "y20");

        let header = csv_header();
        assert_eq!(header.len(), 43);
        assert_eq!(header.last().unwrap(), "label");
    }

    #[test]
    fn test_encode_interleaves_coordinates() {
        let set = sample_set();
        let features = encode(&set);
        assert_eq!(features.len(), 42);
        for i in 0..NUM_LANDMARKS {
            assert_eq!(features.as_slice()[i * 2], set.points()[i].x);
            assert_eq!(features.as_slice()[i * 2 + 1], set.points()[i].y);
        }
    }

    #[test]
    fn test_encode_is_deterministic() {
        let set = sample_set();
        assert_eq!(encode(&set), encode(&set));
    }

    #[test]
    fn test_feature_vector_back_to_landmarks() {
        let set = sample_set();
        assert_eq!(encode(&set).landmarks(), set);
    }

    #[test]
    fn test_wrist_relative_geometry() {
        let set = sample_set();
        let relative = FeatureGeometry::WristRelative.apply(&encode(&set));
        assert_eq!(relative.as_slice()[0], 0.0);
        assert_eq!(relative.as_slice()[1], 0.0);

        let normalized = normalize_to_wrist(&set);
        assert_eq!(normalized.wrist(), Landmark::new(0.0, 0.0));
        for (i, lm) in normalized.points().iter().enumerate() {
            assert!((relative.as_slice()[i * 2] - lm.x).abs() < 1e-6);
            assert!((relative.as_slice()[i * 2 + 1] - lm.y).abs() < 1e-6);
        }

        let raw = FeatureGeometry::Raw.apply(&encode(&set));
        assert_eq!(raw, encode(&set));
    }
}
