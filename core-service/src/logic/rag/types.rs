//! RAG data types
//!
//! Query/answer payloads, the vector store hit shape and the knowledge
//! base record format.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::constants;
use crate::logic::error::ErrorKind;
use crate::logic::online::UpstreamError;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum RagError {
    #[error("{0}")]
    Validation(String),

    #[error("Embedding failed: {0}")]
    Embedding(UpstreamError),

    #[error("Database Connection Error: {0}")]
    VectorStore(UpstreamError),

    #[error("AI Model Error: {0}")]
    Model(UpstreamError),

    #[error("Transcription failed: {0}")]
    Transcription(UpstreamError),
}

impl RagError {
    fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            RagError::Validation(_) => None,
            RagError::Embedding(e)
            | RagError::VectorStore(e)
            | RagError::Model(e)
            | RagError::Transcription(e) => Some(e),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.upstream() {
            None => ErrorKind::ValidationError,
            Some(e) if e.is_rate_limited() => ErrorKind::RateLimited,
            Some(_) => ErrorKind::UpstreamError,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.upstream() {
            Some(UpstreamError::RateLimited { retry_after_secs }) => {
                Some(retry_after_secs.unwrap_or(constants::DEFAULT_RETRY_STEP_SECS))
            }
            _ => None,
        }
    }
}

// ============================================================================
// QUERY / ANSWER
// ============================================================================

fn default_k() -> i64 {
    constants::DEFAULT_RAG_K
}

fn default_language() -> String {
    constants::DEFAULT_LANGUAGE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RagQuery {
    #[validate(length(min = 1, message = "query is required"))]
    pub query: String,

    #[serde(default = "default_k")]
    #[validate(range(min = 1, max = 10, message = "k must be between 1 and 10"))]
    pub k: i64,

    #[serde(default = "default_language")]
    pub language: String,
}

impl RagQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: default_k(),
            language: default_language(),
        }
    }

    pub fn validated(&self) -> Result<usize, RagError> {
        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            messages.sort();
            RagError::Validation(messages.join("; "))
        })?;

        if self.query.trim().is_empty() {
            return Err(RagError::Validation("query is required".to_string()));
        }
        Ok(self.k as usize)
    }
}

/// Where an answer's context came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    pub crop: Option<String>,
    pub disease: Option<String>,
    pub category: Option<String>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<RagSource>,
}

// ============================================================================
// VECTOR STORE
// ============================================================================

/// Payload stored with each knowledge base vector
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KnowledgePayload {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub payload: KnowledgePayload,
    pub score: f32,
}

impl From<&SearchHit> for RagSource {
    fn from(hit: &SearchHit) -> Self {
        RagSource {
            crop: hit.payload.crop.clone(),
            disease: hit.payload.disease.clone(),
            category: hit.payload.category.clone(),
            score: hit.score,
        }
    }
}

// ============================================================================
// KNOWLEDGE BASE RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalizedContent {
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub prevention: String,
}

/// One knowledge base entry. English content is mandatory, other
/// languages are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: String,
    pub crop: String,
    pub category: String,
    pub disease: String,
    pub content: HashMap<String, LocalizedContent>,
}

impl KnowledgeRecord {
    /// Text indexed for a language, falling back to English
    pub fn indexed_text(&self, language: &str) -> Option<String> {
        let content = self
            .content
            .get(language)
            .or_else(|| self.content.get(constants::DEFAULT_LANGUAGE))?;

        Some(format!(
            "Crop: {}\nCategory: {}\nDisease: {}\nSymptoms: {}\nTreatment: {}\nPrevention: {}",
            self.crop, self.category, self.disease, content.symptoms, content.treatment, content.prevention
        ))
    }

    pub fn payload(&self, language: &str) -> Option<KnowledgePayload> {
        Some(KnowledgePayload {
            text: self.indexed_text(language)?,
            crop: Some(self.crop.clone()),
            disease: Some(self.disease.clone()),
            category: Some(self.category.clone()),
        })
    }
}

/// Unique ids, English content on every record
pub fn validate_knowledge_base(records: &[KnowledgeRecord]) -> Result<(), RagError> {
    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.id.as_str()) {
            return Err(RagError::Validation(format!("duplicate record id '{}'", record.id)));
        }
        if !record.content.contains_key(constants::DEFAULT_LANGUAGE) {
            return Err(RagError::Validation(format!(
                "record '{}' has no English content",
                record.id
            )));
        }
    }
    Ok(())
}

// ============================================================================
// LANGUAGES
// ============================================================================

/// Response languages the prompts know by name
pub const LANGUAGE_NAMES: [(&str, &str); 6] = [
    ("en", "English"),
    ("hi", "Hindi"),
    ("ta", "Tamil"),
    ("ml", "Malayalam"),
    ("te", "Telugu"),
    ("kn", "Kannada"),
];

/// Display name for a language code; unknown codes answer in English
pub fn language_name(code: &str) -> &'static str {
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("English")
}
