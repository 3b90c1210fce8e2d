//! Crop & Service Configuration
//!
//! Static configuration loaded once at startup and immutable afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;
use super::model::threshold::SeverityThresholds;
use super::online::retry::RetryPolicy;
use super::preprocess::{Normalization, PreprocessSpec, TensorLayout};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid crop '{crop}': {reason}")]
    InvalidCrop { crop: String, reason: String },
}

// ============================================================================
// CLASSIFIER FAMILY
// ============================================================================

/// Classifier generation. Each family fixes its own input contract; the
/// two are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFamily {
    /// Keras export with Resizing + Rescaling layers inside the graph.
    /// Fed raw 0-255 NHWC, emits probabilities.
    KerasRescaling,
    /// MobileNet-style torch export. Fed ImageNet-normalized NCHW, emits logits.
    TorchImagenet,
}

impl ClassifierFamily {
    pub fn preprocess_spec(&self) -> PreprocessSpec {
        match self {
            ClassifierFamily::KerasRescaling => PreprocessSpec {
                target_size: 256,
                normalization: Normalization::Raw,
            },
            ClassifierFamily::TorchImagenet => PreprocessSpec {
                target_size: 224,
                normalization: Normalization::ImageNet,
            },
        }
    }

    /// Layout the model graph expects; the preprocessor always emits NHWC
    pub fn model_layout(&self) -> TensorLayout {
        match self {
            ClassifierFamily::KerasRescaling => TensorLayout::Nhwc,
            ClassifierFamily::TorchImagenet => TensorLayout::Nchw,
        }
    }

    /// Whether the model head already emits probabilities
    pub fn outputs_probabilities(&self) -> bool {
        matches!(self, ClassifierFamily::KerasRescaling)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierFamily::KerasRescaling => "keras_rescaling",
            ClassifierFamily::TorchImagenet => "torch_imagenet",
        }
    }
}

impl Default for ClassifierFamily {
    fn default() -> Self {
        ClassifierFamily::KerasRescaling
    }
}

// ============================================================================
// CROP MODEL CONFIG
// ============================================================================

/// One crop's classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropModelConfig {
    /// Lowercase key used in requests ("tomato")
    pub key: String,
    /// Display name ("Tomato")
    pub name: String,
    /// Model artifact, relative paths resolve against the models dir
    pub model_path: String,
    #[serde(default)]
    pub family: ClassifierFamily,
    /// Class labels in model output order
    pub classes: Vec<String>,
    #[serde(default)]
    pub display_names: HashMap<String, String>,
    /// Expected SHA-256 of the model artifact (hex)
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub severity_thresholds: Option<SeverityThresholds>,
}

impl CropModelConfig {
    pub fn display_name(&self, class_name: &str) -> String {
        self.display_names
            .get(class_name)
            .cloned()
            .unwrap_or_else(|| class_name.to_string())
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        self.severity_thresholds.clone().unwrap_or_default()
    }

    pub fn resolve_model_path(&self, models_dir: &Path) -> PathBuf {
        let path = Path::new(&self.model_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            models_dir.join(path)
        }
    }

    /// Structural checks done before any model load is attempted
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCrop {
            crop: self.key.clone(),
            reason,
        };

        if self.key.trim().is_empty() {
            return Err(invalid("empty crop key".to_string()));
        }
        if self.key != self.key.to_lowercase() {
            return Err(invalid("crop key must be lowercase".to_string()));
        }
        if let Some(thresholds) = &self.severity_thresholds {
            thresholds.validate().map_err(invalid)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CropConfigFile {
    crops: Vec<CropModelConfig>,
}

/// Load all crop configurations, in file order
pub fn load_crop_configs(path: &Path) -> Result<Vec<CropModelConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let file: CropConfigFile = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    Ok(file.crops)
}

// ============================================================================
// SERVICE CONFIG
// ============================================================================

/// Which classifier implementation backs every crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    Onnx,
    Mock,
}

impl ClassifierBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "onnx" => Some(ClassifierBackend::Onnx),
            "mock" => Some(ClassifierBackend::Mock),
            _ => None,
        }
    }
}

/// Hosted vision model settings
#[derive(Debug, Clone)]
pub struct OnlineSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl OnlineSettings {
    /// Credential presence only, no network call
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }
}

impl Default for OnlineSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: constants::DEFAULT_GEMINI_MODEL.to_string(),
            base_url: constants::DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_secs: constants::DEFAULT_ONLINE_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Hosted models behind the agriculture Q&A service
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub temperature: f32,
    pub whisper_model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl RagSettings {
    /// Needs a chat credential and a vector store
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        present(&self.llm_api_key) && present(&self.qdrant_url)
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_base_url: constants::DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: constants::DEFAULT_LLM_MODEL.to_string(),
            temperature: constants::DEFAULT_LLM_TEMPERATURE,
            whisper_model: constants::DEFAULT_WHISPER_MODEL.to_string(),
            embedding_base_url: constants::DEFAULT_EMBEDDING_BASE_URL.to_string(),
            embedding_model: constants::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_api_key: None,
            qdrant_url: None,
            qdrant_api_key: None,
            collection: constants::DEFAULT_COLLECTION.to_string(),
            timeout_secs: constants::DEFAULT_RAG_TIMEOUT_SECS,
            retry: RetryPolicy::default(),
        }
    }
}

/// Disease inference service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub crop_config_path: PathBuf,
    pub treatments_path: PathBuf,
    pub models_dir: PathBuf,
    pub backend: ClassifierBackend,
    pub model_version: String,
    pub online: OnlineSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            crop_config_path: PathBuf::from(constants::DEFAULT_CROP_CONFIG_PATH),
            treatments_path: PathBuf::from(constants::DEFAULT_TREATMENTS_PATH),
            models_dir: PathBuf::from("."),
            backend: ClassifierBackend::Onnx,
            model_version: constants::DEFAULT_MODEL_VERSION.to_string(),
            online: OnlineSettings::default(),
        }
    }
}
