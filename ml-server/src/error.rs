//! Error handling
//!
//! Every failure leaves the server as JSON with a machine-readable
//! `error_type`. Status codes are derived from the error kind alone:
//!
//! | error_type                            | status |
//! |---------------------------------------|--------|
//! | `validation_error`                    | 400    |
//! | `crop_not_available`, `unknown_crop`  | 404    |
//! | `payload_too_large`                   | 413    |
//! | `rate_limited`                        | 429    |
//! | `configuration_error`                 | 503    |
//! | `upstream_error`                      | 502    |
//! | anything else                         | 500    |
//!
//! 503 means a hosted collaborator (vision model, RAG) is not configured on
//! this server; 502 means it was reached but failed.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cropdoc_core::logic::rag::RagError;
use cropdoc_core::{DetectionError, DetectionFailure, DetectionMode, ErrorKind};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    /// Detection failed; the body carries the mode that produced it
    Detection(DetectionFailure),

    /// Q&A pipeline failure
    Rag(RagError),

    // Validation errors
    ValidationError(String),

    /// Optional subsystem not configured
    ServiceUnavailable(String),

    /// Body over the configured request limit
    PayloadTooLarge(String),
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
        ErrorKind::CropNotAvailable | ErrorKind::UnknownCrop => StatusCode::NOT_FOUND,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::ConfigurationError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
        ErrorKind::DecodeError | ErrorKind::ModelLoadError | ErrorKind::InferenceError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl AppError {
    /// Malformed detection body; reported as an offline validation failure.
    /// An oversized body keeps its 413.
    pub fn detection_rejection(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::Detection(DetectionFailure::new(
            DetectionError::Validation(rejection.body_text()),
            DetectionMode::Offline,
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Detection(failure) => status_for(failure.error.kind()),
            AppError::Rag(err) => status_for(err.kind()),
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(rejection.body_text());
        }
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        AppError::Rag(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Detection(failure) => {
                if status.is_server_error() {
                    tracing::error!("Detection error: {}", failure);
                }
                serde_json::to_value(failure).unwrap_or_else(|_| json!({ "success": false }))
            }
            AppError::Rag(err) => {
                if status.is_server_error() {
                    tracing::error!("RAG error: {}", err);
                }
                let mut body = json!({
                    "error": err.to_string(),
                    "error_type": err.kind(),
                    "status": status.as_u16()
                });
                if let Some(secs) = err.retry_after_secs() {
                    body["retry_after_secs"] = json!(secs);
                }
                body
            }
            AppError::ValidationError(msg) => json!({
                "error": msg,
                "error_type": ErrorKind::ValidationError,
                "status": status.as_u16()
            }),
            AppError::ServiceUnavailable(msg) => json!({
                "error": msg,
                "error_type": ErrorKind::ConfigurationError,
                "status": status.as_u16()
            }),
            AppError::PayloadTooLarge(msg) => {
                tracing::warn!("Rejected oversized body: {}", msg);
                json!({
                    "success": false,
                    "error": msg,
                    "error_type": "payload_too_large",
                    "status": status.as_u16()
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::ValidationError), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::CropNotAvailable), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(ErrorKind::ConfigurationError), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(ErrorKind::UpstreamError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::InferenceError), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorKind::DecodeError), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_detection_failure_status() {
        let err = AppError::Detection(DetectionFailure::new(
            DetectionError::RateLimited { retry_after_secs: 5 },
            DetectionMode::Online,
        ));
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
