//! RAG Query Service
//!
//! Translate (non-ASCII only) → embed → vector search → grounded prompt →
//! chat completion. Also fronts speech-to-text for voice questions.

use std::sync::Arc;

use crate::logic::config::RagSettings;
use crate::logic::online::{RetryPolicy, UpstreamError};
use super::providers::{ChatModel, Embedder, OpenAiChat, OpenAiEmbedder, QdrantStore, SpeechToText, VectorStore, WhisperTranscriber};
use super::types::{language_name, RagAnswer, RagError, RagQuery, RagSource, SearchHit};

const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in my agriculture database.";

// ============================================================================
// PROMPTS
// ============================================================================

fn translation_prompt(query: &str) -> String {
    format!(
        "Translate the following text to English. Output ONLY the translation, nothing else.\n\nText: {}",
        query
    )
}

/// Numbered context block, one entry per hit
fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("Document {}:\n{}\n", i + 1, hit.payload.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-letter language code; blank means English
fn language_code(raw: &str) -> String {
    let code: String = raw.trim().chars().take(2).collect::<String>().to_lowercase();
    if code.is_empty() {
        crate::constants::DEFAULT_LANGUAGE.to_string()
    } else {
        code
    }
}

/// Unsupported codes get the English template
fn answer_prompt(context: &str, question: &str, language: &str) -> String {
    let lang = language_name(language);
    if lang == "English" {
        return format!(
            "You are a helpful agricultural assistant. Answer the question using the Context provided below.\n\n\
             Context:\n{context}\n\n\
             Question: {question}\n\n\
             Instructions:\n\
             - Use the information from the Context to answer the question.\n\
             - Respond in English.\n\
             - Be specific and helpful. Include symptoms, treatments, or prevention methods if available in the context.\n\n\
             Answer:"
        );
    }

    format!(
        "You are a helpful agricultural assistant. You MUST respond ONLY in {lang}. Do NOT use English at all.\n\n\
         Context (use this information to answer, but respond in {lang}):\n{context}\n\n\
         Question: {question}\n\n\
         Instructions:\n\
         1. Every word of your response must be in {lang}.\n\
         2. Use the Context above to answer the question accurately.\n\
         3. Be specific and helpful. Include symptoms, treatments, or prevention methods.\n\
         4. If a technical term has no {lang} equivalent, transliterate it.\n\n\
         Answer in {lang}:"
    )
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct RagQueryService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    chat: Arc<dyn ChatModel>,
    speech: Arc<dyn SpeechToText>,
    collection: String,
    retry: RetryPolicy,
}

impl RagQueryService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatModel>,
        speech: Arc<dyn SpeechToText>,
        collection: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            chat,
            speech,
            collection: collection.into(),
            retry,
        }
    }

    /// HTTP-backed service, `None` when the chat key or vector store is missing
    pub fn from_settings(settings: &RagSettings) -> Result<Option<Self>, UpstreamError> {
        let (Some(api_key), Some(qdrant_url)) = (
            settings.llm_api_key.clone().filter(|k| !k.trim().is_empty()),
            settings.qdrant_url.as_deref().filter(|u| !u.trim().is_empty()),
        ) else {
            return Ok(None);
        };

        let timeout = settings.timeout_secs;
        let embedder = OpenAiEmbedder::new(
            &settings.embedding_base_url,
            &settings.embedding_model,
            settings.embedding_api_key.clone(),
            timeout,
        )?;
        let store = QdrantStore::new(qdrant_url, settings.qdrant_api_key.clone(), timeout)?;
        let chat = OpenAiChat::new(
            &settings.llm_base_url,
            api_key.clone(),
            &settings.llm_model,
            settings.temperature,
            timeout,
        )?;
        let speech = WhisperTranscriber::new(&settings.llm_base_url, api_key, &settings.whisper_model, timeout)?;

        log::info!(
            "RAG service ready (collection {}, model {})",
            settings.collection,
            settings.llm_model
        );

        Ok(Some(Self::new(
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(chat),
            Arc::new(speech),
            settings.collection.clone(),
            settings.retry,
        )))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Best-effort English rendering of a non-ASCII query
    async fn search_text(&self, query: &str) -> String {
        if query.is_ascii() {
            return query.to_string();
        }

        match self.chat.complete(&translation_prompt(query)).await {
            Ok(translated) if !translated.trim().is_empty() => {
                let translated = translated.trim().to_string();
                log::info!("Translated query for search: '{}'", translated);
                translated
            }
            Ok(_) => query.to_string(),
            Err(e) => {
                log::warn!("Translation failed, using original: {}", e);
                query.to_string()
            }
        }
    }

    pub async fn query(&self, request: &RagQuery) -> Result<RagAnswer, RagError> {
        let k = request.validated()?;
        let language = language_code(&request.language);

        let search_text = self.search_text(&request.query).await;
        let vector = self.embedder.embed(&search_text).await.map_err(RagError::Embedding)?;

        let hits = self
            .store
            .search(&self.collection, &vector, k)
            .await
            .map_err(RagError::VectorStore)?;

        if hits.is_empty() {
            return Ok(RagAnswer {
                answer: NO_RESULTS_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        for (i, hit) in hits.iter().enumerate() {
            log::debug!(
                "Result {}: score={:.3} crop={:?} disease={:?}",
                i + 1,
                hit.score,
                hit.payload.crop,
                hit.payload.disease
            );
        }

        let prompt = answer_prompt(&build_context(&hits), &request.query, &language);
        log::info!("Generating response in language: {} ({})", language, language_name(&language));

        let answer = self
            .retry
            .run(|| self.chat.complete(&prompt), UpstreamError::is_rate_limited)
            .await
            .map_err(RagError::Model)?;

        Ok(RagAnswer {
            answer,
            sources: hits.iter().map(RagSource::from).collect(),
        })
    }

    /// Transcript of a voice question. Language hints are cut to two letters.
    pub async fn transcribe(&self, audio: Vec<u8>, filename: &str, language: &str) -> Result<String, RagError> {
        if audio.is_empty() {
            return Err(RagError::Validation("audio is empty".to_string()));
        }

        let language = language_code(language);

        let text = self
            .speech
            .transcribe(audio, filename, &language)
            .await
            .map_err(RagError::Transcription)?;

        Ok(text.trim().to_string())
    }
}
