//! Hosted Vision Model Client
//!
//! Gemini `generateContent` over REST. Also home of `UpstreamError`, the
//! transport error shared by every hosted-model client in the crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::config::OnlineSettings;

// ============================================================================
// UPSTREAM ERRORS
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("Rate limit exceeded (429)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Unauthorized ({0}), check the API key")]
    Unauthorized(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// Map a non-success status to an error; pass successes through
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status.as_u16() {
        429 => {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            Err(UpstreamError::RateLimited { retry_after_secs })
        }
        code @ (401 | 403) => Err(UpstreamError::Unauthorized(code)),
        code => {
            let body = response.text().await.unwrap_or_default();
            Err(UpstreamError::Server { status: code, body })
        }
    }
}

/// Timeout-bounded HTTP client
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| UpstreamError::Transport(format!("Failed to create HTTP client: {}", e)))
}

// ============================================================================
// VISION MODEL TRAIT
// ============================================================================

/// Image attached to a vision prompt
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    /// base64 payload, no data-URI header
    pub data: String,
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String, UpstreamError>;
}

// ============================================================================
// GEMINI
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: &OnlineSettings) -> Result<Self, UpstreamError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(UpstreamError::Unauthorized(401))?;

        Ok(Self {
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http_client: http_client(settings.timeout_secs)?,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, image: &InlineImage) -> Result<String, UpstreamError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let response = check_status(response).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        body.text().ok_or(UpstreamError::EmptyResponse)
    }
}
