//! Disease detection handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use cropdoc_core::{DetectionRequest, DetectionResult, ServiceInfo};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct AvailableCropsResponse {
    pub crops: Vec<String>,
    pub online_available: bool,
}

pub async fn available_crops(State(state): State<AppState>) -> Json<AvailableCropsResponse> {
    Json(AvailableCropsResponse {
        crops: state.service.available_crops(),
        online_available: state.service.online_available(),
    })
}

pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.service.service_info())
}

pub async fn detect_disease(
    State(state): State<AppState>,
    payload: Result<Json<DetectionRequest>, JsonRejection>,
) -> AppResult<Json<DetectionResult>> {
    let request_id = Uuid::new_v4();

    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!(%request_id, "Rejected detection body: {}", rejection.body_text());
        AppError::detection_rejection(rejection)
    })?;

    let crop = req.crop.clone();
    let mode = req.mode.clone();
    let top_k = req.top_k;

    match state.service.detect(req).await {
        Ok(result) => {
            tracing::info!(
                %request_id,
                crop = %crop,
                mode = %result.mode().as_str(),
                top_k,
                total_time_ms = result.total_time_ms(),
                "Detection succeeded"
            );
            Ok(Json(result))
        }
        Err(failure) => {
            tracing::info!(
                %request_id,
                crop = %crop,
                mode = %mode,
                top_k,
                error_type = %failure.error.kind(),
                "Detection failed"
            );
            Err(AppError::Detection(failure))
        }
    }
}
