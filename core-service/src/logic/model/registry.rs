//! Classifier Registry
//!
//! Built once at service start from the crop configuration. Every crop is
//! loaded independently; a failure is logged and the crop left out, so
//! the registry holds exactly the crops that can be served offline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use ndarray::Array4;
use parking_lot::Mutex;
use serde::Serialize;

use crate::logic::config::{ClassifierBackend, CropModelConfig};
use crate::logic::error::DetectionError;
use crate::logic::preprocess::{ImagePreprocessor, PreprocessInfo};
use super::inference::{ClassifierDescription, CropClassifier, InferenceStats, RankedClass};
use super::mock::MockClassifier;
use super::onnx::OnnxClassifier;

/// Builds an unloaded classifier for one crop
pub type ClassifierFactory = Arc<dyn Fn(&CropModelConfig) -> Box<dyn CropClassifier> + Send + Sync>;

/// Factory for the configured backend
pub fn backend_factory(backend: ClassifierBackend, models_dir: PathBuf) -> ClassifierFactory {
    match backend {
        ClassifierBackend::Onnx => Arc::new(move |config: &CropModelConfig| {
            Box::new(OnnxClassifier::new(config, &models_dir)) as Box<dyn CropClassifier>
        }),
        ClassifierBackend::Mock => Arc::new(|config: &CropModelConfig| {
            Box::new(MockClassifier::new(config)) as Box<dyn CropClassifier>
        }),
    }
}

// ============================================================================
// LOADED CLASSIFIER
// ============================================================================

/// Per-crop introspection for service info
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    pub crop: String,
    pub name: String,
    pub num_classes: usize,
    pub family: String,
    pub preprocessing: PreprocessInfo,
    pub model: ClassifierDescription,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
}

/// A crop whose classifier loaded successfully
pub struct LoadedClassifier {
    config: CropModelConfig,
    preprocessor: ImagePreprocessor,
    engine: Mutex<Box<dyn CropClassifier>>,
    /// Taken right after load; the model stays resident, so it never goes stale
    description: ClassifierDescription,
    stats: InferenceStats,
}

impl LoadedClassifier {
    pub fn config(&self) -> &CropModelConfig {
        &self.config
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    /// Calls on one classifier are serialized; different crops run in parallel
    pub fn predict(&self, input: &Array4<f32>, top_k: usize) -> Result<Vec<RankedClass>, DetectionError> {
        let start = Instant::now();
        let ranked = {
            let mut engine = self.engine.lock();
            engine.predict(input, top_k)?
        };
        self.stats.record(start.elapsed());
        Ok(ranked)
    }

    pub fn inference_count(&self) -> u64 {
        self.stats.count()
    }

    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            crop: self.config.key.clone(),
            name: self.config.name.clone(),
            num_classes: self.config.classes.len(),
            family: self.config.family.as_str().to_string(),
            preprocessing: self.preprocessor.describe(),
            model: self.description.clone(),
            inference_count: self.stats.count(),
            avg_latency_ms: self.stats.avg_latency_ms(),
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// A crop that was configured but could not be loaded
#[derive(Debug, Clone, Serialize)]
pub struct LoadFailure {
    pub crop: String,
    pub error: String,
}

#[derive(Default)]
pub struct ModelRegistry {
    entries: Vec<Arc<LoadedClassifier>>,
}

impl ModelRegistry {
    /// Eagerly load every configured crop, in configuration order
    pub fn load(configs: Vec<CropModelConfig>, factory: &ClassifierFactory) -> (Self, Vec<LoadFailure>) {
        let mut entries: Vec<Arc<LoadedClassifier>> = Vec::with_capacity(configs.len());
        let mut failures = Vec::new();

        for config in configs {
            let crop = config.key.clone();
            match Self::load_one(config, factory, &entries) {
                Ok(entry) => {
                    log::info!("Loaded classifier for {}", crop);
                    entries.push(Arc::new(entry));
                }
                Err(error) => {
                    log::warn!("Skipping crop {}: {}", crop, error);
                    failures.push(LoadFailure { crop, error });
                }
            }
        }

        log::info!(
            "Classifier registry ready: {} loaded, {} failed",
            entries.len(),
            failures.len()
        );
        (Self { entries }, failures)
    }

    fn load_one(
        config: CropModelConfig,
        factory: &ClassifierFactory,
        loaded: &[Arc<LoadedClassifier>],
    ) -> Result<LoadedClassifier, String> {
        config.validate().map_err(|e| e.to_string())?;

        if loaded.iter().any(|entry| entry.config.key == config.key) {
            return Err(format!("duplicate crop key '{}'", config.key));
        }

        let mut engine = factory(&config);
        engine.load().map_err(|e| e.to_string())?;
        let description = engine.describe();

        Ok(LoadedClassifier {
            preprocessor: ImagePreprocessor::new(config.family.preprocess_spec()),
            config,
            engine: Mutex::new(engine),
            description,
            stats: InferenceStats::default(),
        })
    }

    pub fn get(&self, crop: &str) -> Option<Arc<LoadedClassifier>> {
        self.entries.iter().find(|entry| entry.config.key == crop).cloned()
    }

    /// Servable crops, in configuration order
    pub fn crops(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.config.key.clone()).collect()
    }

    pub fn entries(&self) -> &[Arc<LoadedClassifier>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::ClassifierFamily;
    use crate::logic::model::ModelError;
    use std::collections::HashMap;

    fn crop(key: &str, classes: &[&str]) -> CropModelConfig {
        CropModelConfig {
            key: key.into(),
            name: key.to_uppercase(),
            model_path: format!("{}.onnx", key),
            family: ClassifierFamily::KerasRescaling,
            classes: classes.iter().map(|c| c.to_string()).collect(),
            display_names: HashMap::new(),
            sha256: None,
            severity_thresholds: None,
        }
    }

    #[test]
    fn test_failed_crops_are_excluded() {
        let factory = backend_factory(ClassifierBackend::Mock, PathBuf::from("."));
        let (registry, failures) = ModelRegistry::load(
            vec![
                crop("tomato", &["Tomato_Early_blight", "Tomato_healthy"]),
                crop("corn", &[]),
                crop("potato", &["Potato_healthy"]),
            ],
            &factory,
        );

        assert_eq!(registry.crops(), vec!["tomato".to_string(), "potato".to_string()]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].crop, "corn");
        assert!(registry.get("corn").is_none());
    }

    #[test]
    fn test_duplicate_key_is_a_failure() {
        let factory = backend_factory(ClassifierBackend::Mock, PathBuf::from("."));
        let (registry, failures) =
            ModelRegistry::load(vec![crop("tomato", &["a"]), crop("tomato", &["b"])], &factory);
        assert_eq!(registry.len(), 1);
        assert!(failures[0].error.contains("duplicate"));
    }

    #[test]
    fn test_missing_onnx_artifacts_leave_registry_empty() {
        let factory = backend_factory(ClassifierBackend::Onnx, PathBuf::from("/nonexistent"));
        let (registry, failures) = ModelRegistry::load(vec![crop("tomato", &["a", "b"])], &factory);
        assert!(registry.is_empty());
        assert!(failures[0].error.contains("not found"));
    }

    #[test]
    fn test_predict_records_stats() {
        let factory = backend_factory(ClassifierBackend::Mock, PathBuf::from("."));
        let (registry, _) = ModelRegistry::load(vec![crop("pepperbell", &["a", "b", "c"])], &factory);
        let entry = registry.get("pepperbell").unwrap();

        let input = Array4::<f32>::from_elem((1, 8, 8, 3), 90.0);
        let ranked = entry.predict(&input, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(entry.inference_count(), 1);

        let info = entry.info();
        assert_eq!(info.num_classes, 3);
        assert_eq!(info.preprocessing.target_size, 256);
        assert!(info.model.loaded);
    }

    /// Forward pass parks until the test releases it
    struct GatedClassifier {
        entered: std::sync::mpsc::Sender<()>,
        release: std::sync::mpsc::Receiver<()>,
    }

    impl CropClassifier for GatedClassifier {
        fn load(&mut self) -> Result<(), ModelError> {
            Ok(())
        }

        fn is_loaded(&self) -> bool {
            true
        }

        fn num_classes(&self) -> usize {
            2
        }

        fn forward(&mut self, _input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            Ok(vec![0.7, 0.3])
        }

        fn describe(&self) -> ClassifierDescription {
            ClassifierDescription {
                model_type: "gated".into(),
                model_path: None,
                loaded: true,
                loaded_at: None,
            }
        }
    }

    #[test]
    fn test_info_does_not_wait_for_running_inference() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Mutex::new(Some((entered_tx, release_rx)));
        let factory: ClassifierFactory = Arc::new(move |_config: &CropModelConfig| {
            let (entered, release) = gate.lock().take().unwrap();
            Box::new(GatedClassifier { entered, release }) as Box<dyn CropClassifier>
        });
        let (registry, _) = ModelRegistry::load(vec![crop("tomato", &["a", "b"])], &factory);
        let entry = registry.get("tomato").unwrap();

        let predicting = Arc::clone(&entry);
        let worker = std::thread::spawn(move || {
            predicting.predict(&Array4::<f32>::zeros((1, 4, 4, 3)), 1).unwrap()
        });
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (info_tx, info_rx) = mpsc::channel();
        let inspecting = Arc::clone(&entry);
        std::thread::spawn(move || {
            let _ = info_tx.send(inspecting.info());
        });
        let info = info_rx.recv_timeout(Duration::from_secs(2));

        release_tx.send(()).unwrap();
        worker.join().unwrap();

        let info = info.expect("info blocked behind a running forward pass");
        assert_eq!(info.model.model_type, "gated");
        assert_eq!(info.num_classes, 2);
    }
}
