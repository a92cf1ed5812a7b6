//! Model Pool
//!
//! Compiles the palm detection and hand landmark networks once at startup
//! and hands out shared handles for inference.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use ndarray::Array4;
use openvino::{CompiledModel, Core, ElementType, Shape, Tensor};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::{InferenceConfig, ModelsConfig};

/// Upper bound on outputs probed per request
const MAX_OUTPUTS: usize = 8;

/// Wrapper for OpenVINO Core that implements Send + Sync
struct SafeCore(#[allow(dead_code)] Core);
unsafe impl Send for SafeCore {}
unsafe impl Sync for SafeCore {}

/// Wrapper for OpenVINO CompiledModel that implements Send + Sync
///
/// The Rust bindings need `&mut` to create requests, so access goes
/// through a mutex.
#[derive(Clone)]
pub struct SafeCompiledModel(Arc<Mutex<CompiledModel>>);
unsafe impl Send for SafeCompiledModel {}
unsafe impl Sync for SafeCompiledModel {}

impl SafeCompiledModel {
    /// Run one synchronous inference on an NCHW f32 tensor.
    ///
    /// Returns every output flattened, in output index order.
    pub fn infer(&self, input: &Array4<f32>) -> Result<Vec<Vec<f32>>> {
        let mut request = self.0.lock().create_infer_request()?;

        let dims: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let shape = Shape::new(&dims)?;
        let mut tensor = Tensor::new(ElementType::F32, &shape)?;

        let data = input.as_slice().context("input tensor is not contiguous")?;
        let raw = tensor.get_raw_data_mut()?;
        for (dst, value) in raw.chunks_exact_mut(4).zip(data) {
            dst.copy_from_slice(&value.to_ne_bytes());
        }

        request.set_input_tensor(&tensor)?;
        request.infer()?;

        let mut outputs = Vec::new();
        for i in 0..MAX_OUTPUTS {
            match request.get_output_tensor_by_index(i) {
                Ok(output) => outputs.push(read_tensor_f32(&output)?),
                Err(_) => break,
            }
        }
        debug!("Inference produced {} outputs", outputs.len());

        Ok(outputs)
    }
}

/// Read tensor data as f32 vector
fn read_tensor_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let total: i64 = tensor.get_shape()?.get_dimensions().iter().product();
    let raw = tensor.get_raw_data()?;

    let data: Vec<f32> = raw
        .chunks_exact(4)
        .take(total.max(0) as usize)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(data)
}

/// Model types that can be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    PalmDetector,
    HandLandmark,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::PalmDetector => "palm_detector",
            ModelType::HandLandmark => "hand_landmark",
        }
    }
}

/// Compiled hand models sharing one OpenVINO core
pub struct ModelPool {
    palm_detector: SafeCompiledModel,
    hand_landmark: SafeCompiledModel,
    // Dropped after the compiled models
    _core: SafeCore,
}

impl ModelPool {
    /// Read and compile both hand models on the configured device
    pub fn new(config: &InferenceConfig, models: &ModelsConfig) -> Result<Self> {
        let mut core = Core::new()?;

        let palm_detector = compile(&mut core, &config.device, ModelType::PalmDetector, &models.palm_detector)?;
        let hand_landmark = compile(&mut core, &config.device, ModelType::HandLandmark, &models.hand_landmark)?;

        Ok(Self {
            palm_detector,
            hand_landmark,
            _core: SafeCore(core),
        })
    }

    pub fn get_model(&self, model_type: ModelType) -> SafeCompiledModel {
        match model_type {
            ModelType::PalmDetector => self.palm_detector.clone(),
            ModelType::HandLandmark => self.hand_landmark.clone(),
        }
    }
}

fn compile(core: &mut Core, device: &str, model_type: ModelType, path: &Path) -> Result<SafeCompiledModel> {
    let path_str = path
        .to_str()
        .with_context(|| format!("model path is not valid UTF-8: {}", path.display()))?;

    info!("Loading model: {} from {}", model_type.as_str(), path_str);
    let start = Instant::now();

    let model = core
        .read_model_from_file(path_str, "")
        .with_context(|| format!("failed to read {} model", model_type.as_str()))?;
    let compiled = core.compile_model(&model, device.into())?;

    info!("Model {} loaded in {:?}", model_type.as_str(), start.elapsed());
    Ok(SafeCompiledModel(Arc::new(Mutex::new(compiled))))
}
