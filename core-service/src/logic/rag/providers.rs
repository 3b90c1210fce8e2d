//! Hosted collaborators of the RAG service
//!
//! Each collaborator is a trait so the query flow can be tested with
//! in-process doubles. The HTTP implementations speak the OpenAI-compatible
//! REST dialect (Groq, local embedding servers) and Qdrant's query API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::logic::online::client::{check_status, http_client};
use crate::logic::online::UpstreamError;
use super::types::{KnowledgePayload, SearchHit};

// ============================================================================
// TRAITS
// ============================================================================

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, UpstreamError>;
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError>;
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str, language: &str) -> Result<String, UpstreamError>;
}

fn parse_error(e: reqwest::Error) -> UpstreamError {
    UpstreamError::Parse(e.to_string())
}

fn bearer(request: reqwest::RequestBuilder, key: Option<&str>) -> reqwest::RequestBuilder {
    match key {
        Some(key) if !key.trim().is_empty() => request.bearer_auth(key),
        _ => request,
    }
}

// ============================================================================
// EMBEDDINGS
// ============================================================================

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            http_client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let request = self
            .http_client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { model: &self.model, input: text });

        let response = bearer(request, self.api_key.as_deref())
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        let body: EmbeddingResponse = check_status(response).await?.json().await.map_err(parse_error)?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(UpstreamError::EmptyResponse)
    }
}

// ============================================================================
// QDRANT
// ============================================================================

#[derive(Serialize)]
struct QueryPointsRequest<'a> {
    query: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct QueryPointsResponse {
    result: QueryPointsResult,
}

#[derive(Deserialize)]
struct QueryPointsResult {
    #[serde(default)]
    points: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<KnowledgePayload>,
}

pub struct QdrantStore {
    url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl QdrantStore {
    pub fn new(url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            api_key,
            http_client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn search(&self, collection: &str, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>, UpstreamError> {
        let mut request = self
            .http_client
            .post(format!("{}/collections/{}/points/query", self.url, collection))
            .json(&QueryPointsRequest { query: vector, limit, with_payload: true });
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(UpstreamError::from_reqwest)?;
        let body: QueryPointsResponse = check_status(response).await?.json().await.map_err(parse_error)?;

        Ok(body
            .result
            .points
            .into_iter()
            .map(|p| SearchHit {
                payload: p.payload.unwrap_or_default(),
                score: p.score,
            })
            .collect())
    }
}

// ============================================================================
// CHAT COMPLETIONS
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiChat {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    http_client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            temperature,
            http_client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String, UpstreamError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        let body: ChatResponse = check_status(response).await?.json().await.map_err(parse_error)?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(UpstreamError::EmptyResponse)
    }
}

// ============================================================================
// TRANSCRIPTION
// ============================================================================

pub struct WhisperTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    http_client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(base_url: &str, api_key: String, model: &str, timeout_secs: u64) -> Result<Self, UpstreamError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            http_client: http_client(timeout_secs)?,
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, filename: &str, language: &str) -> Result<String, UpstreamError> {
        let file = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", language.to_string())
            .text("response_format", "text");

        let response = self
            .http_client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        check_status(response).await?.text().await.map_err(parse_error)
    }
}
