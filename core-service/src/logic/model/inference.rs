//! Inference Engine Trait & Top-K Selection
//!
//! A classifier produces one score per known class; this module turns
//! scores into a ranked, deterministic top-k list.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::error::DetectionError;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Model artifact corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Classifier for crop '{0}' is not loaded")]
    NotLoaded(String),

    #[error("{0}")]
    Runtime(String),
}

impl From<ModelError> for DetectionError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::NotFound(_) | ModelError::Corrupt(_) | ModelError::InvalidConfig(_) => {
                DetectionError::ModelLoad(err.to_string())
            }
            ModelError::NotLoaded(crop) => DetectionError::UnknownCrop(crop),
            ModelError::Runtime(msg) => DetectionError::Inference(msg),
        }
    }
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One ranked class from a forward pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedClass {
    pub class_index: usize,
    pub confidence: f32,
}

/// Static description of a classifier for introspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierDescription {
    pub model_type: String,
    pub model_path: Option<String>,
    pub loaded: bool,
    pub loaded_at: Option<DateTime<Utc>>,
}

// ============================================================================
// INFERENCE ENGINE TRAIT
// ============================================================================

/// Per-crop classifier (ONNX, mock, ...)
///
/// Loaded once, then resident for the service lifetime. Implementations
/// take `&mut self` for inference; callers serialize access per instance.
pub trait CropClassifier: Send {
    fn load(&mut self) -> Result<(), ModelError>;

    fn is_loaded(&self) -> bool;

    /// Number of classes the model scores
    fn num_classes(&self) -> usize;

    /// Forward pass: one confidence in [0, 1] per class, in class order
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError>;

    fn describe(&self) -> ClassifierDescription;

    /// Top-k classes, confidence-descending. An unloaded classifier
    /// loads itself first, which may fail.
    fn predict(&mut self, input: &Array4<f32>, top_k: usize) -> Result<Vec<RankedClass>, ModelError> {
        if !self.is_loaded() {
            self.load()?;
        }

        let scores = self.forward(input)?;
        if scores.len() != self.num_classes() {
            return Err(ModelError::Runtime(format!(
                "model produced {} scores for {} classes",
                scores.len(),
                self.num_classes()
            )));
        }

        Ok(select_top_k(&scores, top_k))
    }
}

// ============================================================================
// SCORING HELPERS
// ============================================================================

/// Highest `k` scores, confidence-descending, ties broken by ascending
/// class index. Non-finite scores count as 0; all values clamp to [0, 1].
pub fn select_top_k(scores: &[f32], k: usize) -> Vec<RankedClass> {
    let mut ranked: Vec<RankedClass> = scores
        .iter()
        .enumerate()
        .map(|(class_index, &score)| RankedClass {
            class_index,
            confidence: if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 },
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.class_index.cmp(&b.class_index))
    });
    ranked.truncate(k);
    ranked
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }

    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

// ============================================================================
// LATENCY STATS
// ============================================================================

/// Per-classifier inference counters
#[derive(Debug, Default)]
pub struct InferenceStats {
    latency_sum_us: AtomicU64,
    count: AtomicU64,
}

impl InferenceStats {
    pub fn record(&self, elapsed: Duration) {
        self.latency_sum_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn avg_latency_ms(&self) -> f32 {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.count();
        if count > 0 {
            (sum as f32 / count as f32) / 1000.0
        } else {
            0.0
        }
    }
}
