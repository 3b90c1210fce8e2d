//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! The server reads overrides from the environment; everything it does not
//! override falls back to the values here.

/// Model version reported by detection responses and health checks
pub const DEFAULT_MODEL_VERSION: &str = "v2.0.0";

/// Crop classifier configuration file
pub const DEFAULT_CROP_CONFIG_PATH: &str = "data/crop_classes.json";

/// Disease treatment catalog file
pub const DEFAULT_TREATMENTS_PATH: &str = "data/disease_treatments.json";

/// Default number of predictions per detection request
pub const DEFAULT_TOP_K: i64 = 3;

/// Inclusive bounds for `top_k`
pub const MIN_TOP_K: i64 = 1;
pub const MAX_TOP_K: i64 = 10;

/// Largest accepted request body; base64 photos run about a third over
/// their file size
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Crop hint that means "no hint" for online detection
pub const OTHER_CROP: &str = "other";

// ============================================
// Online vision fallback
// ============================================

/// Hosted vision model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Hosted vision API base URL
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Request timeout for hosted model calls (seconds)
pub const DEFAULT_ONLINE_TIMEOUT_SECS: u64 = 60;

// ============================================
// Upstream retry policy
// ============================================

/// Attempts per hosted model call before a rate limit is surfaced
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Linear backoff step: wait = attempt * step
pub const DEFAULT_RETRY_STEP_SECS: u64 = 5;

// ============================================
// RAG
// ============================================

/// Vector store collection holding the knowledge base
pub const DEFAULT_COLLECTION: &str = "RAG_AGRI";

/// OpenAI-compatible chat endpoint (Groq)
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Chat model for translation and grounded answers
pub const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Sampling temperature for grounded answers
pub const DEFAULT_LLM_TEMPERATURE: f32 = 0.3;

/// Speech-to-text model
pub const DEFAULT_WHISPER_MODEL: &str = "whisper-large-v3";

/// OpenAI-compatible embeddings endpoint (e.g. a local embedding server)
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "http://localhost:8080/v1";

/// Sentence embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Default number of knowledge base documents per query
pub const DEFAULT_RAG_K: i64 = 3;

/// Response language when none is given
pub const DEFAULT_LANGUAGE: &str = "en";

/// Request timeout for RAG upstream calls (seconds)
pub const DEFAULT_RAG_TIMEOUT_SECS: u64 = 120;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "CropDoc";
