//! Disease Inference Service
//!
//! Long-lived singleton built once at startup. Owns the classifier
//! registry and the treatment catalog, and creates the online fallback on
//! first use. Nothing outside this type can add or remove registry entries.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;

use crate::constants;
use crate::logic::config::{load_crop_configs, CropModelConfig, OnlineSettings, ServiceConfig};
use crate::logic::error::DetectionError;
use crate::logic::model::registry::backend_factory;
use crate::logic::model::threshold::{is_healthy_class, severity};
use crate::logic::model::{ClassifierFactory, LoadFailure, ModelRegistry, RankedClass};
use crate::logic::online::{GeminiClient, OnlineVisionFallback, VisionModel};
use crate::logic::treatment::TreatmentCatalog;
use super::types::{
    DetectionFailure, DetectionMode, DetectionRequest, DetectionResult, HealthReport, HealthStatus,
    OfflineDetection, OnlineDetection, Prediction, ServiceInfo, TopKRange,
};

// ============================================================================
// BUILDER
// ============================================================================

/// Startup wiring. Crops, catalog, classifiers and vision model default to
/// what `ServiceConfig` points at; each can be swapped before `build`.
pub struct ServiceBuilder {
    config: ServiceConfig,
    crops: Option<Vec<CropModelConfig>>,
    catalog: Option<TreatmentCatalog>,
    factory: Option<ClassifierFactory>,
    vision_model: Option<Arc<dyn VisionModel>>,
}

impl ServiceBuilder {
    pub fn crops(mut self, crops: Vec<CropModelConfig>) -> Self {
        self.crops = Some(crops);
        self
    }

    pub fn catalog(mut self, catalog: TreatmentCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn classifier_factory(mut self, factory: ClassifierFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn vision_model(mut self, model: Arc<dyn VisionModel>) -> Self {
        self.vision_model = Some(model);
        self
    }

    /// Load every classifier and the catalog. Never fails: problems are
    /// logged and reflected in `health()`.
    pub fn build(self) -> DiseaseInferenceService {
        let mut startup_errors = Vec::new();

        let crops = match self.crops {
            Some(crops) => crops,
            None => match load_crop_configs(&self.config.crop_config_path) {
                Ok(crops) => crops,
                Err(e) => {
                    log::error!("Crop configuration unavailable: {}", e);
                    startup_errors.push(e.to_string());
                    Vec::new()
                }
            },
        };

        log::info!(
            "Loading classifiers for crops: {:?}",
            crops.iter().map(|c| c.key.as_str()).collect::<Vec<_>>()
        );

        let factory = self
            .factory
            .unwrap_or_else(|| backend_factory(self.config.backend, self.config.models_dir.clone()));
        let (registry, load_failures) = ModelRegistry::load(crops, &factory);

        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => match TreatmentCatalog::load(&self.config.treatments_path) {
                Ok(catalog) => catalog,
                Err(e) => {
                    log::error!("Treatment catalog unavailable: {}", e);
                    startup_errors.push(e.to_string());
                    TreatmentCatalog::default()
                }
            },
        };

        DiseaseInferenceService {
            registry,
            load_failures,
            catalog,
            startup_errors,
            online_settings: self.config.online,
            vision_model: self.vision_model,
            online: OnceCell::new(),
            model_version: self.config.model_version,
        }
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct DiseaseInferenceService {
    registry: ModelRegistry,
    load_failures: Vec<LoadFailure>,
    catalog: TreatmentCatalog,
    startup_errors: Vec<String>,
    online_settings: OnlineSettings,
    vision_model: Option<Arc<dyn VisionModel>>,
    online: OnceCell<Arc<OnlineVisionFallback>>,
    model_version: String,
}

fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis() as u64
}

impl DiseaseInferenceService {
    pub fn builder(config: ServiceConfig) -> ServiceBuilder {
        ServiceBuilder {
            config,
            crops: None,
            catalog: None,
            factory: None,
            vision_model: None,
        }
    }

    /// Build from configuration files alone
    pub fn start(config: ServiceConfig) -> Self {
        Self::builder(config).build()
    }

    // ------------------------------------------------------------------------
    // Detection
    // ------------------------------------------------------------------------

    /// Validate, then dispatch by mode. Offline inference runs on the
    /// blocking pool.
    pub async fn detect(self: &Arc<Self>, request: DetectionRequest) -> Result<DetectionResult, DetectionFailure> {
        let reported_mode = request.reported_mode();
        let (mode, top_k) = request
            .validated()
            .map_err(|e| DetectionFailure::new(e, reported_mode))?;

        let outcome = match mode {
            DetectionMode::Offline => {
                let service = Arc::clone(self);
                let DetectionRequest { image_base64, crop, .. } = request;
                tokio::task::spawn_blocking(move || service.detect_offline(&image_base64, &crop, top_k))
                    .await
                    .unwrap_or_else(|e| Err(DetectionError::Inference(format!("inference task failed: {}", e))))
                    .map(DetectionResult::Offline)
            }
            DetectionMode::Online => self
                .detect_online(&request.image_base64, Some(&request.crop))
                .await
                .map(DetectionResult::Online),
        };

        outcome.map_err(|error| {
            log::warn!("{} detection failed ({}): {}", mode.as_str(), error.kind(), error);
            DetectionFailure::new(error, mode)
        })
    }

    /// Local classifier path: preprocess → predict → severity → treatments
    pub fn detect_offline(&self, image_base64: &str, crop: &str, top_k: usize) -> Result<OfflineDetection, DetectionError> {
        let start = Instant::now();

        if !(constants::MIN_TOP_K..=constants::MAX_TOP_K).contains(&(top_k as i64)) {
            return Err(DetectionError::Validation(format!(
                "top_k must be between {} and {}",
                constants::MIN_TOP_K,
                constants::MAX_TOP_K
            )));
        }

        let crop = crop.trim().to_lowercase();
        let entry = self
            .registry
            .get(&crop)
            .ok_or_else(|| DetectionError::CropNotAvailable {
                crop: crop.clone(),
                available: self.registry.crops(),
            })?;

        let input = entry.preprocessor().preprocess(image_base64)?;
        let preprocess_time = start.elapsed();

        let inference_start = Instant::now();
        let ranked = entry.predict(&input, top_k)?;
        let inference_time = inference_start.elapsed();

        let predictions = ranked
            .iter()
            .map(|r| self.to_prediction(entry.config(), r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OfflineDetection {
            success: true,
            top_prediction: predictions.first().cloned(),
            predictions,
            preprocess_time_ms: millis(preprocess_time),
            inference_time_ms: millis(inference_time),
            total_time_ms: millis(start.elapsed()),
            model_version: self.model_version.clone(),
            mode: DetectionMode::Offline,
            crop,
        })
    }

    fn to_prediction(&self, config: &CropModelConfig, ranked: &RankedClass) -> Result<Prediction, DetectionError> {
        let class_name = config.classes.get(ranked.class_index).ok_or_else(|| {
            DetectionError::Inference(format!(
                "class index {} out of range for {}",
                ranked.class_index, config.key
            ))
        })?;

        let thresholds = config.thresholds();
        Ok(Prediction {
            disease: config.display_name(class_name),
            crop: config.name.clone(),
            confidence: ranked.confidence,
            severity: severity(ranked.confidence, is_healthy_class(class_name), &thresholds),
            class_name: class_name.clone(),
            treatments: self.catalog.lookup(class_name),
        })
    }

    /// Hosted vision path. "other" or a blank hint means no crop hint.
    pub async fn detect_online(&self, image_base64: &str, crop_hint: Option<&str>) -> Result<OnlineDetection, DetectionError> {
        let start = Instant::now();

        let hint = crop_hint
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty() && c != constants::OTHER_CROP);

        let fallback = self.online_fallback()?;
        let analysis = fallback.analyze(image_base64, hint.as_deref()).await?;

        Ok(OnlineDetection {
            success: true,
            analysis: analysis.analysis,
            model: analysis.model,
            crop: hint,
            total_time_ms: millis(start.elapsed()),
            mode: DetectionMode::Online,
        })
    }

    /// Created at most once; an unconfigured credential fails every call
    /// without touching the network
    fn online_fallback(&self) -> Result<Arc<OnlineVisionFallback>, DetectionError> {
        self.online
            .get_or_try_init(|| {
                let model: Arc<dyn VisionModel> = match &self.vision_model {
                    Some(model) => Arc::clone(model),
                    None => {
                        if !self.online_settings.is_configured() {
                            return Err(DetectionError::Configuration(
                                "GEMINI_API_KEY is not configured".to_string(),
                            ));
                        }
                        let client = GeminiClient::new(&self.online_settings)
                            .map_err(|e| DetectionError::Configuration(e.to_string()))?;
                        Arc::new(client)
                    }
                };

                log::info!("Online vision fallback initialized ({})", model.model_name());
                Ok(Arc::new(OnlineVisionFallback::new(model, self.online_settings.retry)))
            })
            .map(Arc::clone)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn available_crops(&self) -> Vec<String> {
        self.registry.crops()
    }

    /// Credential presence only
    pub fn online_available(&self) -> bool {
        self.vision_model.is_some() || self.online_settings.is_configured()
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.load_failures
    }

    /// Completed predictions for a crop, `None` if the crop is not loaded
    pub fn inference_count(&self, crop: &str) -> Option<u64> {
        self.registry.get(crop).map(|entry| entry.inference_count())
    }

    pub fn health(&self) -> HealthReport {
        let status = if !self.startup_errors.is_empty() {
            HealthStatus::Unhealthy
        } else if self.registry.is_empty() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            timestamp: chrono::Utc::now(),
            offline_models_loaded: self.registry.len(),
            available_crops: self.registry.crops(),
            online_mode_available: self.online_available(),
            model_version: self.model_version.clone(),
            errors: self.startup_errors.clone(),
        }
    }

    pub fn service_info(&self) -> ServiceInfo {
        ServiceInfo {
            service: "Disease Detection Service".to_string(),
            version: self.model_version.clone(),
            mode: "hybrid (offline + online)".to_string(),
            offline_models: self.registry.entries().iter().map(|e| e.info()).collect(),
            failed_crops: self.load_failures.clone(),
            available_crops: self.registry.crops(),
            online_available: self.online_available(),
            online_model: self.online_settings.model.clone(),
            treatments_loaded: self.catalog.len(),
            top_k: TopKRange::default(),
        }
    }
}
