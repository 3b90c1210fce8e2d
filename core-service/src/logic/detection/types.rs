//! Detection request/response types
//!
//! Success and failure are both plain data. Every response, failed or not,
//! carries the `mode` that produced it.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

use crate::constants;
use crate::logic::error::DetectionError;
use crate::logic::model::{ClassifierInfo, LoadFailure, SeverityLevel};
use crate::logic::treatment::Treatments;

// ============================================================================
// REQUEST
// ============================================================================

fn default_mode() -> String {
    DetectionMode::Offline.as_str().to_string()
}

fn default_top_k() -> i64 {
    constants::DEFAULT_TOP_K
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DetectionRequest {
    #[validate(length(min = 1, message = "image_base64 is required"))]
    pub image_base64: String,

    #[validate(length(min = 1, message = "crop is required"))]
    pub crop: String,

    #[serde(default = "default_mode")]
    pub mode: String,

    #[serde(default = "default_top_k")]
    #[validate(range(min = 1, max = 10, message = "top_k must be between 1 and 10"))]
    pub top_k: i64,
}

impl DetectionRequest {
    pub fn new(image_base64: impl Into<String>, crop: impl Into<String>, mode: DetectionMode, top_k: i64) -> Self {
        Self {
            image_base64: image_base64.into(),
            crop: crop.into(),
            mode: mode.as_str().to_string(),
            top_k,
        }
    }

    /// Mode to report on failure, even when the field itself is invalid
    pub fn reported_mode(&self) -> DetectionMode {
        DetectionMode::parse(&self.mode).unwrap_or(DetectionMode::Offline)
    }

    /// Field checks done before any dispatch
    pub fn validated(&self) -> Result<(DetectionMode, usize), DetectionError> {
        if let Err(errors) = self.validate() {
            let mut messages: Vec<String> = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{} is invalid", field))
                    })
                })
                .collect();
            messages.sort();
            return Err(DetectionError::Validation(messages.join("; ")));
        }

        if self.image_base64.trim().is_empty() {
            return Err(DetectionError::Validation("image_base64 is required".to_string()));
        }
        if self.crop.trim().is_empty() {
            return Err(DetectionError::Validation("crop is required".to_string()));
        }

        let mode = DetectionMode::parse(&self.mode).ok_or_else(|| {
            DetectionError::Validation(format!("mode must be 'offline' or 'online', got '{}'", self.mode))
        })?;

        Ok((mode, self.top_k as usize))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Offline,
    Online,
}

impl DetectionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "offline" => Some(DetectionMode::Offline),
            "online" => Some(DetectionMode::Online),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Offline => "offline",
            DetectionMode::Online => "online",
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// One ranked disease prediction with remediation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub disease: String,
    pub crop: String,
    pub confidence: f32,
    pub severity: SeverityLevel,
    pub class_name: String,
    pub treatments: Treatments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineDetection {
    pub success: bool,
    /// Confidence-descending
    pub predictions: Vec<Prediction>,
    pub top_prediction: Option<Prediction>,
    pub preprocess_time_ms: u64,
    pub inference_time_ms: u64,
    pub total_time_ms: u64,
    pub model_version: String,
    pub mode: DetectionMode,
    pub crop: String,
}

/// Free-text analysis from the hosted vision model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineDetection {
    pub success: bool,
    pub analysis: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    pub total_time_ms: u64,
    pub mode: DetectionMode,
}

/// Schema depends on the mode; `mode` tells the client which one it got
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetectionResult {
    Offline(OfflineDetection),
    Online(OnlineDetection),
}

impl DetectionResult {
    pub fn mode(&self) -> DetectionMode {
        match self {
            DetectionResult::Offline(r) => r.mode,
            DetectionResult::Online(r) => r.mode,
        }
    }

    pub fn total_time_ms(&self) -> u64 {
        match self {
            DetectionResult::Offline(r) => r.total_time_ms,
            DetectionResult::Online(r) => r.total_time_ms,
        }
    }
}

/// A failed detection
#[derive(Debug, Clone)]
pub struct DetectionFailure {
    pub error: DetectionError,
    pub mode: DetectionMode,
}

impl DetectionFailure {
    pub fn new(error: DetectionError, mode: DetectionMode) -> Self {
        Self { error, mode }
    }
}

impl std::fmt::Display for DetectionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.mode.as_str(), self.error)
    }
}

impl std::error::Error for DetectionFailure {}

impl Serialize for DetectionFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("success", &false)?;
        map.serialize_entry("error", &self.error.to_string())?;
        map.serialize_entry("error_type", &self.error.kind())?;
        map.serialize_entry("mode", &self.mode)?;
        if let Some(crops) = self.error.available_crops() {
            map.serialize_entry("available_crops", crops)?;
        }
        if let Some(secs) = self.error.retry_after_secs() {
            map.serialize_entry("retry_after_secs", &secs)?;
        }
        map.end()
    }
}

// ============================================================================
// HEALTH & INTROSPECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub offline_models_loaded: usize,
    pub available_crops: Vec<String>,
    pub online_mode_available: bool,
    pub model_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TopKRange {
    pub default: i64,
    pub min: i64,
    pub max: i64,
}

impl Default for TopKRange {
    fn default() -> Self {
        Self {
            default: constants::DEFAULT_TOP_K,
            min: constants::MIN_TOP_K,
            max: constants::MAX_TOP_K,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub service: String,
    pub version: String,
    pub mode: String,
    pub offline_models: Vec<ClassifierInfo>,
    pub failed_crops: Vec<LoadFailure>,
    pub available_crops: Vec<String>,
    pub online_available: bool,
    pub online_model: String,
    pub treatments_loaded: usize,
    pub top_k: TopKRange,
}
