//! Hand landmark engine
//!
//! OpenVINO inference for the two hand models:
//! - Palm detection on a letterboxed 192x192 frame
//! - Landmark regression on a rotated 224x224 crop around the palm
//!
//! Everything outside this module only sees [`LandmarkExtractor`].

pub mod extractor;
pub mod landmark;
pub mod palm;
pub mod pool;
pub mod preprocess;

pub use extractor::{HandTracker, LandmarkExtractor};
pub use pool::ModelPool;
pub use preprocess::decode_image;
