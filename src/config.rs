//! Sign recognition service configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory holding the companion frontend (index.html, script.js, style.css, assets/)
    pub frontend_dir: PathBuf,
    pub max_upload_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub palm_detector: PathBuf,
    pub hand_landmark: PathBuf,
    pub classifier: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub device: String,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Minimum winning-class probability for a non-null prediction
    pub confidence_threshold: f32,
    pub top_k: usize,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }

    /// Apply the `PORT` environment variable on top of the file settings
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            frontend_dir: PathBuf::from("frontend"),
            max_upload_mb: 16,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            palm_detector: PathBuf::from("models/palm_detection_full.onnx"),
            hand_landmark: PathBuf::from("models/hand_landmark_full.onnx"),
            classifier: PathBuf::from("asl_model.bin"),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            device: "CPU".to_string(),
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            confidence_threshold: 0.3,
            top_k: 3,
        }
    }
}
