use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ndarray::Array4;
use parking_lot::Mutex;

use super::service::DiseaseInferenceService;
use super::types::{DetectionMode, DetectionRequest, DetectionResult, HealthStatus};
use crate::logic::config::{ClassifierBackend, ClassifierFamily, CropModelConfig, ServiceConfig};
use crate::logic::error::{DetectionError, ErrorKind};
use crate::logic::model::{ClassifierDescription, ClassifierFactory, CropClassifier, ModelError, SeverityLevel};
use crate::logic::online::{InlineImage, RetryPolicy, UpstreamError, VisionModel};
use crate::logic::preprocess::test_image_base64;
use crate::logic::treatment::{TreatmentCatalog, Treatments};

// ============================================================================
// FIXTURES
// ============================================================================

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

/// Mock backend over the shipped crop configuration and catalog
fn shipped_config() -> ServiceConfig {
    let mut config = ServiceConfig {
        crop_config_path: data_file("crop_classes.json"),
        treatments_path: data_file("disease_treatments.json"),
        backend: ClassifierBackend::Mock,
        ..Default::default()
    };
    config.online.retry = RetryPolicy::new(3, Duration::ZERO);
    config
}

fn mock_service() -> Arc<DiseaseInferenceService> {
    Arc::new(DiseaseInferenceService::start(shipped_config()))
}

fn crop(key: &str, classes: &[&str]) -> CropModelConfig {
    CropModelConfig {
        key: key.into(),
        name: key[..1].to_uppercase() + &key[1..],
        model_path: format!("{}.onnx", key),
        family: ClassifierFamily::KerasRescaling,
        classes: classes.iter().map(|c| c.to_string()).collect(),
        display_names: HashMap::new(),
        sha256: None,
        severity_thresholds: None,
    }
}

fn leaf_image() -> String {
    test_image_base64(64, 48, [46, 125, 50])
}

/// Classifier returning fixed scores, counting forward passes
struct ScoredClassifier {
    scores: Vec<f32>,
    loaded: bool,
    calls: Arc<AtomicUsize>,
}

impl CropClassifier for ScoredClassifier {
    fn load(&mut self) -> Result<(), ModelError> {
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn num_classes(&self) -> usize {
        self.scores.len()
    }

    fn forward(&mut self, _input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.scores.clone())
    }

    fn describe(&self) -> ClassifierDescription {
        ClassifierDescription {
            model_type: "Scored".into(),
            model_path: None,
            loaded: self.loaded,
            loaded_at: None,
        }
    }
}

fn scored_factory(scores: Vec<f32>, calls: Arc<AtomicUsize>) -> ClassifierFactory {
    Arc::new(move |_config: &CropModelConfig| {
        Box::new(ScoredClassifier {
            scores: scores.clone(),
            loaded: false,
            calls: Arc::clone(&calls),
        }) as Box<dyn CropClassifier>
    })
}

/// Vision model that always answers the same way
struct FixedVision {
    reply: Result<String, UpstreamError>,
    prompts: Mutex<Vec<String>>,
}

impl FixedVision {
    fn new(reply: Result<String, UpstreamError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionModel for FixedVision {
    fn model_name(&self) -> &str {
        "fixed-vision"
    }

    async fn generate(&self, prompt: &str, _image: &InlineImage) -> Result<String, UpstreamError> {
        self.prompts.lock().push(prompt.to_string());
        self.reply.clone()
    }
}

// ============================================================================
// OFFLINE DETECTION
// ============================================================================

#[test]
fn test_top_k_returns_exact_count_descending() {
    let service = mock_service();
    let image = leaf_image();

    for k in 1..=10 {
        let result = service.detect_offline(&image, "tomato", k).unwrap();
        assert_eq!(result.predictions.len(), k);
        assert!(result.predictions.iter().all(|p| (0.0..=1.0).contains(&p.confidence)));
        assert!(result
            .predictions
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
    }
}

#[tokio::test]
async fn test_tomato_offline_scenario() {
    let service = mock_service();
    let request = DetectionRequest::new(leaf_image(), "tomato", DetectionMode::Offline, 3);

    let result = match service.detect(request).await.unwrap() {
        DetectionResult::Offline(result) => result,
        other => panic!("expected offline result, got {:?}", other),
    };

    assert!(result.success);
    assert_eq!(result.mode, DetectionMode::Offline);
    assert_eq!(result.crop, "tomato");
    assert_eq!(result.predictions.len(), 3);
    assert_eq!(result.top_prediction.as_ref(), result.predictions.first());
    assert_eq!(result.model_version, "v2.0.0");
    assert!(result.total_time_ms >= result.inference_time_ms);

    for prediction in &result.predictions {
        assert_eq!(prediction.crop, "Tomato");
        let t = &prediction.treatments;
        assert!(!t.organic.is_empty() && !t.chemical.is_empty() && !t.preventive.is_empty());
    }
}

#[tokio::test]
async fn test_invalid_top_k_runs_no_inference() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = Arc::new(
        DiseaseInferenceService::builder(ServiceConfig::default())
            .crops(vec![crop("tomato", &["Tomato_Early_blight", "Tomato_healthy"])])
            .catalog(TreatmentCatalog::default())
            .classifier_factory(scored_factory(vec![0.7, 0.3], calls.clone()))
            .build(),
    );

    for top_k in [0, 11, -3] {
        let request = DetectionRequest::new(leaf_image(), "tomato", DetectionMode::Offline, top_k);
        let failure = service.detect(request).await.unwrap_err();
        assert_eq!(failure.error.kind(), ErrorKind::ValidationError);
        assert_eq!(failure.mode, DetectionMode::Offline);
    }

    let direct = service.detect_offline(&leaf_image(), "tomato", 0).unwrap_err();
    assert_eq!(direct.kind(), ErrorKind::ValidationError);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.inference_count("tomato"), Some(0));
}

#[test]
fn test_repeated_detection_is_identical() {
    let service = mock_service();
    let image = test_image_base64(300, 200, [120, 80, 40]);

    let first = service.detect_offline(&image, "potato", 3).unwrap();
    let second = service.detect_offline(&image, "potato", 3).unwrap();
    assert_eq!(first.predictions, second.predictions);
}

#[test]
fn test_ties_break_by_class_index() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = DiseaseInferenceService::builder(ServiceConfig::default())
        .crops(vec![crop("pepperbell", &["A_spot", "B_spot", "C_spot", "Pepper_healthy"])])
        .catalog(TreatmentCatalog::default())
        .classifier_factory(scored_factory(vec![0.3, 0.3, 0.1, 0.3], calls))
        .build();

    let result = service.detect_offline(&leaf_image(), "pepperbell", 4).unwrap();
    let order: Vec<&str> = result.predictions.iter().map(|p| p.class_name.as_str()).collect();
    assert_eq!(order, vec!["A_spot", "B_spot", "Pepper_healthy", "C_spot"]);
}

#[test]
fn test_severity_and_treatments_attached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut catalog = HashMap::new();
    catalog.insert(
        "Potato_Late_blight".to_string(),
        Treatments {
            organic: vec!["Copper fungicide".into()],
            chemical: vec!["Metalaxyl".into()],
            preventive: vec!["Certified seed".into()],
        },
    );

    let mut potato = crop("potato", &["Potato_Late_blight", "Potato_healthy"]);
    potato.display_names.insert("Potato_Late_blight".into(), "Late Blight".into());

    let service = DiseaseInferenceService::builder(ServiceConfig::default())
        .crops(vec![potato])
        .catalog(TreatmentCatalog::new(catalog))
        .classifier_factory(scored_factory(vec![0.95, 0.99], calls))
        .build();

    let result = service.detect_offline(&leaf_image(), "Potato", 2).unwrap();
    let healthy = &result.predictions[0];
    assert_eq!(healthy.class_name, "Potato_healthy");
    assert_eq!(healthy.severity, SeverityLevel::None);
    assert_eq!(healthy.treatments, Treatments::unavailable());

    let blight = &result.predictions[1];
    assert_eq!(blight.disease, "Late Blight");
    assert_eq!(blight.severity, SeverityLevel::Critical);
    assert_eq!(blight.treatments.chemical, vec!["Metalaxyl".to_string()]);
}

#[test]
fn test_undecodable_image_is_decode_error() {
    let service = mock_service();
    let err = service.detect_offline("not-an-image!!", "tomato", 3).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecodeError);
}

// ============================================================================
// REGISTRY MEMBERSHIP
// ============================================================================

#[tokio::test]
async fn test_unconfigured_crop_lists_available_crops() {
    let service = mock_service();
    let request = DetectionRequest::new(leaf_image(), "banana", DetectionMode::Offline, 3);

    let failure = service.detect(request).await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::CropNotAvailable);
    assert_eq!(failure.mode, DetectionMode::Offline);
    assert_eq!(
        failure.error.available_crops().unwrap(),
        &["tomato".to_string(), "potato".to_string(), "pepperbell".to_string()]
    );
}

#[tokio::test]
async fn test_failed_load_is_not_servable() {
    let service = Arc::new(
        DiseaseInferenceService::builder(ServiceConfig {
            backend: ClassifierBackend::Mock,
            ..Default::default()
        })
        .crops(vec![
            crop("tomato", &["Tomato_Early_blight", "Tomato_healthy"]),
            crop("corn", &[]),
            crop("potato", &["Potato_Early_blight", "Potato_healthy"]),
        ])
        .catalog(TreatmentCatalog::default())
        .build(),
    );

    assert_eq!(service.available_crops(), vec!["tomato".to_string(), "potato".to_string()]);
    assert_eq!(service.load_failures().len(), 1);
    assert_eq!(service.health().status, HealthStatus::Healthy);

    let request = DetectionRequest::new(leaf_image(), "corn", DetectionMode::Offline, 3);
    let failure = service.detect(request).await.unwrap_err();
    assert_eq!(failure.error.kind(), ErrorKind::CropNotAvailable);
    assert_eq!(
        failure.error.available_crops().unwrap(),
        &["tomato".to_string(), "potato".to_string()]
    );
}

// ============================================================================
// ONLINE DETECTION
// ============================================================================

#[tokio::test]
async fn test_online_without_credential_is_configuration_error() {
    let service = mock_service();
    assert!(!service.online_available());

    let request = DetectionRequest::new(leaf_image(), "other", DetectionMode::Online, 3);
    let failure = service.detect(request).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::ConfigurationError);
    assert_eq!(failure.mode, DetectionMode::Online);
    assert!(failure.error.to_string().contains("not available"));

    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["mode"], "online");
}

#[tokio::test]
async fn test_online_other_means_no_hint() {
    let vision = FixedVision::new(Ok("**Plant Identified:** Banana".into()));
    let service = Arc::new(
        DiseaseInferenceService::builder(shipped_config())
            .vision_model(vision.clone())
            .build(),
    );
    assert!(service.online_available());

    let request = DetectionRequest::new(leaf_image(), "Other", DetectionMode::Online, 3);
    let result = match service.detect(request).await.unwrap() {
        DetectionResult::Online(result) => result,
        other => panic!("expected online result, got {:?}", other),
    };

    assert!(result.success);
    assert_eq!(result.mode, DetectionMode::Online);
    assert_eq!(result.crop, None);
    assert_eq!(result.model, "fixed-vision");
    assert!(result.analysis.contains("Banana"));
    assert!(vision.prompts.lock()[0].contains("Identify this plant"));

    let hinted = service.detect_online(&leaf_image(), Some("potato")).await.unwrap();
    assert_eq!(hinted.crop.as_deref(), Some("potato"));
    assert!(vision.prompts.lock()[1].contains("potato plant"));
}

#[tokio::test]
async fn test_online_rate_limit_is_distinguishable() {
    let vision = FixedVision::new(Err(UpstreamError::RateLimited { retry_after_secs: Some(12) }));
    let service = Arc::new(
        DiseaseInferenceService::builder(shipped_config())
            .vision_model(vision.clone())
            .build(),
    );

    let request = DetectionRequest::new(leaf_image(), "tomato", DetectionMode::Online, 3);
    let failure = service.detect(request).await.unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::RateLimited);
    assert_eq!(failure.error.retry_after_secs(), Some(12));
    assert_eq!(failure.mode, DetectionMode::Online);
    assert_eq!(vision.prompts.lock().len(), 3);
}

#[tokio::test]
async fn test_online_upstream_failure_is_structured() {
    let vision = FixedVision::new(Err(UpstreamError::Server { status: 500, body: "boom".into() }));
    let service = DiseaseInferenceService::builder(shipped_config())
        .vision_model(vision)
        .build();

    let err = service.detect_online(&leaf_image(), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamError);
    assert!(matches!(err, DetectionError::Upstream(_)));
}

// ============================================================================
// CONCURRENCY
// ============================================================================

/// Flags any forward pass that starts while another is still running
struct ProbeClassifier {
    in_flight: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl CropClassifier for ProbeClassifier {
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
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(2));
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        Ok(vec![0.6, 0.4])
    }

    fn describe(&self) -> ClassifierDescription {
        ClassifierDescription {
            model_type: "Probe".into(),
            model_path: None,
            loaded: true,
            loaded_at: None,
        }
    }
}

#[test]
fn test_concurrent_predicts_on_one_classifier_are_serialized() {
    let in_flight = Arc::new(AtomicBool::new(false));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let factory: ClassifierFactory = {
        let (in_flight, overlaps, calls) = (in_flight.clone(), overlaps.clone(), calls.clone());
        Arc::new(move |_config: &CropModelConfig| {
            Box::new(ProbeClassifier {
                in_flight: Arc::clone(&in_flight),
                overlaps: Arc::clone(&overlaps),
                calls: Arc::clone(&calls),
            }) as Box<dyn CropClassifier>
        })
    };

    let service = DiseaseInferenceService::builder(ServiceConfig::default())
        .crops(vec![crop("tomato", &["Tomato_Early_blight", "Tomato_healthy"])])
        .catalog(TreatmentCatalog::default())
        .classifier_factory(factory)
        .build();

    let image = test_image_base64(16, 16, [10, 200, 10]);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..5 {
                    let result = service.detect_offline(&image, "tomato", 2).unwrap();
                    assert_eq!(result.predictions.len(), 2);
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 40);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(service.inference_count("tomato"), Some(40));
}

// ============================================================================
// HEALTH & INFO
// ============================================================================

#[test]
fn test_health_states() {
    let healthy = mock_service().health();
    assert_eq!(healthy.status, HealthStatus::Healthy);
    assert_eq!(healthy.offline_models_loaded, 3);
    assert!(!healthy.online_mode_available);

    let degraded = DiseaseInferenceService::builder(ServiceConfig {
        backend: ClassifierBackend::Onnx,
        models_dir: PathBuf::from("/nonexistent"),
        ..shipped_config()
    })
    .build()
    .health();
    assert_eq!(degraded.status, HealthStatus::Degraded);
    assert_eq!(degraded.offline_models_loaded, 0);
    assert!(degraded.available_crops.is_empty());

    let bad_catalog = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(bad_catalog.path(), "{ not json").unwrap();
    let unhealthy = DiseaseInferenceService::start(ServiceConfig {
        treatments_path: bad_catalog.path().to_path_buf(),
        ..shipped_config()
    })
    .health();
    assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    assert_eq!(unhealthy.errors.len(), 1);
}

#[test]
fn test_health_reports_credential_without_network() {
    let mut config = shipped_config();
    config.online.api_key = Some("test-key".into());
    config.online.base_url = "http://127.0.0.1:9".into();

    let health = DiseaseInferenceService::start(config).health();
    assert!(health.online_mode_available);
}

#[test]
fn test_service_info() {
    let service = mock_service();
    service.detect_offline(&leaf_image(), "tomato", 1).unwrap();

    let info = service.service_info();
    assert_eq!(info.available_crops, vec!["tomato", "potato", "pepperbell"]);
    assert_eq!(info.offline_models.len(), 3);
    assert!(info.treatments_loaded > 0);
    assert_eq!(info.top_k.min, 1);
    assert_eq!(info.top_k.max, 10);

    let tomato = &info.offline_models[0];
    assert_eq!(tomato.num_classes, 10);
    assert_eq!(tomato.preprocessing.target_size, 256);
    assert_eq!(tomato.inference_count, 1);
    assert!(info.failed_crops.is_empty());
}
