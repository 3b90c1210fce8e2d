//! CropDoc ML Server
//!
//! HTTP front for the disease inference service and the agriculture Q&A.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      CROPDOC ML SERVER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌────────────────────┐  ┌────────────────┐ │
//! │  │  API      │  │  Disease Inference │  │  RAG Q&A       │ │
//! │  │  (Axum)   │  │  offline / online  │  │  (optional)    │ │
//! │  └─────┬─────┘  └─────────┬──────────┘  └───────┬────────┘ │
//! │        └──────────────────┼─────────────────────┘          │
//! │                           ▼                                 │
//! │        ONNX classifiers · hosted vision · Qdrant + LLM      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use cropdoc_core::logic::rag::RagQueryService;
use cropdoc_core::DiseaseInferenceService;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env().context("invalid configuration")?;

    // Initialize logging; JSON lines in production
    let (json_layer, text_layer) = if config.is_production() {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cropdoc_server=debug,cropdoc_core=info,tower_http=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();

    tracing::info!("CropDoc ML Server starting ({})...", config.environment);
    tracing::info!("Crop config: {}", config.crop_config_path.display());

    // Classifier sessions are built synchronously
    let service_config = config.service_config();
    let service = tokio::task::spawn_blocking(move || DiseaseInferenceService::start(service_config))
        .await
        .context("service startup task failed")?;
    let service = Arc::new(service);

    let health = service.health();
    tracing::info!(
        "Disease inference: {:?}, {} offline model(s) {:?}, online {}",
        health.status,
        health.offline_models_loaded,
        health.available_crops,
        if health.online_mode_available { "available" } else { "unavailable" }
    );
    for failure in service.load_failures() {
        tracing::warn!("Crop '{}' unavailable: {}", failure.crop, failure.error);
    }

    let rag = match RagQueryService::from_settings(&config.rag_settings()) {
        Ok(Some(rag)) => Some(Arc::new(rag)),
        Ok(None) => {
            tracing::info!("RAG disabled (GROQ_API_KEY or QDRANT_URL not set)");
            None
        }
        Err(e) => {
            tracing::warn!("RAG disabled: {}", e);
            None
        }
    };

    // Build application state
    let state = AppState { service, rag };

    let app = create_router(state, config.max_body_bytes);

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiseaseInferenceService>,
    pub rag: Option<Arc<RagQueryService>>,
}

/// Create the main router with all routes
fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let ml_routes = Router::new()
        .route("/ml/detect-disease", post(handlers::detection::detect_disease))
        .route("/ml/available-crops", get(handlers::detection::available_crops))
        .route("/ml/service-info", get(handlers::detection::service_info));

    let rag_routes = Router::new()
        .route("/rag/query", post(handlers::rag::query))
        .route("/rag/transcribe", post(handlers::rag::transcribe));

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .merge(ml_routes)
        .merge(rag_routes)
        // Photos and voice notes arrive base64-encoded inside JSON
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
