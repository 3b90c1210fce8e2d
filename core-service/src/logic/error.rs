//! Detection Error Taxonomy
//!
//! Closed set of failure kinds. Callers branch on `ErrorKind`, never on
//! message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR KIND
// ============================================================================

/// Machine-readable error category, serialized as `error_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    CropNotAvailable,
    UnknownCrop,
    DecodeError,
    ModelLoadError,
    InferenceError,
    ConfigurationError,
    RateLimited,
    UpstreamError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::CropNotAvailable => "crop_not_available",
            ErrorKind::UnknownCrop => "unknown_crop",
            ErrorKind::DecodeError => "decode_error",
            ErrorKind::ModelLoadError => "model_load_error",
            ErrorKind::InferenceError => "inference_error",
            ErrorKind::ConfigurationError => "configuration_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }

    /// Client input problems; everything else is on our side or upstream
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::ValidationError | ErrorKind::CropNotAvailable | ErrorKind::UnknownCrop
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// DETECTION ERROR
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    #[error("{0}")]
    Validation(String),

    #[error("Model not available for crop: {crop}. Available crops: {}", available.join(", "))]
    CropNotAvailable { crop: String, available: Vec<String> },

    #[error("Classifier for crop '{0}' is not loaded")]
    UnknownCrop(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Online detection service not available: {0}")]
    Configuration(String),

    #[error("Upstream model is rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Online detection failed: {0}")]
    Upstream(String),
}

impl DetectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectionError::Validation(_) => ErrorKind::ValidationError,
            DetectionError::CropNotAvailable { .. } => ErrorKind::CropNotAvailable,
            DetectionError::UnknownCrop(_) => ErrorKind::UnknownCrop,
            DetectionError::Decode(_) => ErrorKind::DecodeError,
            DetectionError::ModelLoad(_) => ErrorKind::ModelLoadError,
            DetectionError::Inference(_) => ErrorKind::InferenceError,
            DetectionError::Configuration(_) => ErrorKind::ConfigurationError,
            DetectionError::RateLimited { .. } => ErrorKind::RateLimited,
            DetectionError::Upstream(_) => ErrorKind::UpstreamError,
        }
    }

    /// Crops the client can retry with, for not-found errors
    pub fn available_crops(&self) -> Option<&[String]> {
        match self {
            DetectionError::CropNotAvailable { available, .. } => Some(available),
            _ => None,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DetectionError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}
