//! Online Vision Fallback
//!
//! Sends the image plus a structured-analysis prompt to a hosted vision
//! model. The answer is free text and is passed through unparsed.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::logic::error::DetectionError;
use crate::logic::preprocess::decode_base64;
use super::client::{InlineImage, UpstreamError, VisionModel};
use super::prompt::build_prompt;
use super::retry::RetryPolicy;

/// Successful hosted-model analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineAnalysis {
    pub analysis: String,
    pub model: String,
}

pub struct OnlineVisionFallback {
    model: Arc<dyn VisionModel>,
    retry: RetryPolicy,
}

impl OnlineVisionFallback {
    pub fn new(model: Arc<dyn VisionModel>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub async fn analyze(
        &self,
        encoded_image: &str,
        crop_hint: Option<&str>,
    ) -> Result<OnlineAnalysis, DetectionError> {
        let image = inline_image(encoded_image)?;
        let prompt = build_prompt(crop_hint);

        let analysis = self
            .retry
            .run(|| self.model.generate(&prompt, &image), UpstreamError::is_rate_limited)
            .await
            .map_err(|e| self.to_detection_error(e))?;

        Ok(OnlineAnalysis {
            analysis,
            model: self.model.model_name().to_string(),
        })
    }

    fn to_detection_error(&self, err: UpstreamError) -> DetectionError {
        log::error!("Online detection failed: {}", err);
        match err {
            UpstreamError::RateLimited { retry_after_secs } => DetectionError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or_else(|| self.retry.backoff_step.as_secs()),
            },
            other => DetectionError::Upstream(other.to_string()),
        }
    }
}

/// Validate the payload is an image and tag it with its MIME type
fn inline_image(encoded: &str) -> Result<InlineImage, DetectionError> {
    let bytes = decode_base64(encoded)?;
    let format = image::guess_format(&bytes)
        .map_err(|e| DetectionError::Decode(format!("unrecognized image format: {}", e)))?;

    Ok(InlineImage {
        mime_type: format.to_mime_type().to_string(),
        data: BASE64.encode(&bytes),
    })
}
