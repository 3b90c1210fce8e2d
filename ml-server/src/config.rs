//! Configuration module

use std::env;
use std::path::PathBuf;

use cropdoc_core::constants;
use cropdoc_core::logic::config::{ClassifierBackend, OnlineSettings, RagSettings, ServiceConfig};
use cropdoc_core::logic::online::RetryPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Request body limit in bytes
    pub max_body_bytes: usize,

    pub crop_config_path: PathBuf,
    pub treatments_path: PathBuf,

    /// Base directory for relative model paths
    pub models_dir: PathBuf,

    pub backend: ClassifierBackend,
    pub model_version: String,

    // Online vision fallback
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub online_timeout_secs: u64,

    // RAG
    pub groq_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub whisper_model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub embedding_api_key: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank both mean "not configured"
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_value = var_or("CLASSIFIER_BACKEND", "onnx");
        let backend = ClassifierBackend::parse(&backend_value).ok_or(ConfigError::Invalid {
            name: "CLASSIFIER_BACKEND",
            value: backend_value,
        })?;

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parsed_var("PORT", 8000)?,
            environment: var_or("ENVIRONMENT", "development"),
            max_body_bytes: parsed_var("MAX_BODY_BYTES", constants::DEFAULT_MAX_BODY_BYTES)?,

            crop_config_path: PathBuf::from(var_or("CROP_CONFIG_PATH", constants::DEFAULT_CROP_CONFIG_PATH)),
            treatments_path: PathBuf::from(var_or("TREATMENTS_PATH", constants::DEFAULT_TREATMENTS_PATH)),
            models_dir: PathBuf::from(var_or("MODELS_DIR", ".")),
            backend,
            model_version: var_or("MODEL_VERSION", constants::DEFAULT_MODEL_VERSION),

            gemini_api_key: optional_var("GEMINI_API_KEY"),
            gemini_model: var_or("GEMINI_MODEL", constants::DEFAULT_GEMINI_MODEL),
            gemini_base_url: var_or("GEMINI_BASE_URL", constants::DEFAULT_GEMINI_BASE_URL),
            online_timeout_secs: parsed_var("ONLINE_TIMEOUT_SECS", constants::DEFAULT_ONLINE_TIMEOUT_SECS)?,

            groq_api_key: optional_var("GROQ_API_KEY"),
            llm_base_url: var_or("LLM_BASE_URL", constants::DEFAULT_LLM_BASE_URL),
            llm_model: var_or("LLM_MODEL", constants::DEFAULT_LLM_MODEL),
            whisper_model: var_or("WHISPER_MODEL", constants::DEFAULT_WHISPER_MODEL),
            embedding_base_url: var_or("EMBEDDING_BASE_URL", constants::DEFAULT_EMBEDDING_BASE_URL),
            embedding_model: var_or("EMBEDDING_MODEL", constants::DEFAULT_EMBEDDING_MODEL),
            embedding_api_key: optional_var("EMBEDDING_API_KEY"),
            qdrant_url: optional_var("QDRANT_URL"),
            qdrant_api_key: optional_var("QDRANT_API_KEY"),
            qdrant_collection: var_or("QDRANT_COLLECTION", constants::DEFAULT_COLLECTION),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            crop_config_path: self.crop_config_path.clone(),
            treatments_path: self.treatments_path.clone(),
            models_dir: self.models_dir.clone(),
            backend: self.backend,
            model_version: self.model_version.clone(),
            online: OnlineSettings {
                api_key: self.gemini_api_key.clone(),
                model: self.gemini_model.clone(),
                base_url: self.gemini_base_url.clone(),
                timeout_secs: self.online_timeout_secs,
                retry: RetryPolicy::default(),
            },
        }
    }

    pub fn rag_settings(&self) -> RagSettings {
        RagSettings {
            llm_api_key: self.groq_api_key.clone(),
            llm_base_url: self.llm_base_url.clone(),
            llm_model: self.llm_model.clone(),
            whisper_model: self.whisper_model.clone(),
            embedding_base_url: self.embedding_base_url.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_api_key: self.embedding_api_key.clone(),
            qdrant_url: self.qdrant_url.clone(),
            qdrant_api_key: self.qdrant_api_key.clone(),
            collection: self.qdrant_collection.clone(),
            ..RagSettings::default()
        }
    }
}
