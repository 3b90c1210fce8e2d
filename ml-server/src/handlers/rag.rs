//! Agriculture Q&A handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cropdoc_core::constants;
use cropdoc_core::logic::rag::{RagAnswer, RagQuery, RagQueryService};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub audio_base64: String,
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_filename() -> String {
    "audio.webm".to_string()
}

fn default_language() -> String {
    constants::DEFAULT_LANGUAGE.to_string()
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

fn rag_service(state: &AppState) -> AppResult<Arc<RagQueryService>> {
    state
        .rag
        .clone()
        .ok_or_else(|| AppError::ServiceUnavailable("RAG is not configured".to_string()))
}

pub async fn query(
    State(state): State<AppState>,
    payload: Result<Json<RagQuery>, JsonRejection>,
) -> AppResult<Json<RagAnswer>> {
    let rag = rag_service(&state)?;
    let Json(req) = payload?;

    let answer = rag.query(&req).await?;
    tracing::info!(
        language = %req.language,
        k = req.k,
        sources = answer.sources.len(),
        "RAG query answered"
    );

    Ok(Json(answer))
}

pub async fn transcribe(
    State(state): State<AppState>,
    payload: Result<Json<TranscribeRequest>, JsonRejection>,
) -> AppResult<Json<TranscribeResponse>> {
    let rag = rag_service(&state)?;
    let Json(req) = payload?;

    let audio = STANDARD
        .decode(req.audio_base64.trim())
        .map_err(|e| AppError::ValidationError(format!("audio_base64 is not valid base64: {}", e)))?;

    let text = rag.transcribe(audio, &req.filename, &req.language).await?;
    Ok(Json(TranscribeResponse { text }))
}
