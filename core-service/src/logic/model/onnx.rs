//! ONNX Runtime Classifier
//!
//! Loads an exported crop classifier and runs it on preprocessed tensors.
//! The artifact is read into memory, checked against the configured
//! SHA-256 (when one is set), then committed to an ort session.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use sha2::{Digest, Sha256};

use crate::logic::config::{ClassifierFamily, CropModelConfig};
use crate::logic::preprocess::TensorLayout;
use super::inference::{softmax, ClassifierDescription, CropClassifier, ModelError};

pub struct OnnxClassifier {
    crop: String,
    model_path: PathBuf,
    expected_sha256: Option<String>,
    family: ClassifierFamily,
    num_classes: usize,
    session: Option<Session>,
    loaded_at: Option<DateTime<Utc>>,
}

impl OnnxClassifier {
    pub fn new(config: &CropModelConfig, models_dir: &Path) -> Self {
        Self {
            crop: config.key.clone(),
            model_path: config.resolve_model_path(models_dir),
            expected_sha256: config.sha256.clone(),
            family: config.family,
            num_classes: config.classes.len(),
            session: None,
            loaded_at: None,
        }
    }

    fn read_artifact(&self) -> Result<Vec<u8>, ModelError> {
        if !self.model_path.exists() {
            return Err(ModelError::NotFound(self.model_path.display().to_string()));
        }

        let bytes = std::fs::read(&self.model_path)
            .map_err(|e| ModelError::Corrupt(format!("{}: {}", self.model_path.display(), e)))?;

        if let Some(expected) = &self.expected_sha256 {
            verify_checksum(&bytes, expected)?;
        }
        Ok(bytes)
    }

    /// Preprocessor output is NHWC; reorder for NCHW graphs
    fn to_model_layout(&self, input: &Array4<f32>) -> Array4<f32> {
        match self.family.model_layout() {
            TensorLayout::Nhwc => input.clone(),
            TensorLayout::Nchw => input
                .view()
                .permuted_axes([0, 3, 1, 2])
                .as_standard_layout()
                .into_owned(),
        }
    }
}

/// Compare artifact bytes against a hex SHA-256
pub fn verify_checksum(bytes: &[u8], expected_hex: &str) -> Result<(), ModelError> {
    let actual = hex::encode(Sha256::digest(bytes));
    if actual.eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        Err(ModelError::Corrupt(format!(
            "checksum mismatch (expected {}, got {})",
            expected_hex, actual
        )))
    }
}

impl CropClassifier for OnnxClassifier {
    fn load(&mut self) -> Result<(), ModelError> {
        log::info!("Loading {} model from: {}", self.crop, self.model_path.display());

        if self.num_classes == 0 {
            return Err(ModelError::InvalidConfig(format!("crop '{}' declares no classes", self.crop)));
        }

        let bytes = self.read_artifact()?;

        let session = Session::builder()
            .map_err(|e| ModelError::Corrupt(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ModelError::Corrupt(format!("Failed to set optimization: {}", e)))?
            .commit_from_memory(&bytes)
            .map_err(|e| ModelError::Corrupt(format!("Failed to load model: {}", e)))?;

        self.session = Some(session);
        self.loaded_at = Some(Utc::now());

        log::info!("{} model loaded ({} classes)", self.crop, self.num_classes);
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let input_array = self.to_model_layout(input);
        let apply_softmax = !self.family.outputs_probabilities();

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ModelError::NotLoaded(self.crop.clone()))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::Runtime("No output defined".to_string()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| ModelError::Runtime(format!("Tensor error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| ModelError::Runtime(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| ModelError::Runtime("No output".to_string()))?;

        let output_tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Runtime(format!("Extract error: {}", e)))?;

        // batch of one: the first row is the whole result
        let scores: Vec<f32> = output_tensor.1.iter().take(self.num_classes).copied().collect();

        Ok(if apply_softmax { softmax(&scores) } else { scores })
    }

    fn describe(&self) -> ClassifierDescription {
        ClassifierDescription {
            model_type: format!("ONNX Runtime ({})", self.family.as_str()),
            model_path: Some(self.model_path.display().to_string()),
            loaded: self.is_loaded(),
            loaded_at: self.loaded_at,
        }
    }
}
