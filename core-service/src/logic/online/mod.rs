//! Online Module - Hosted vision model fallback
//!
//! Used for crops without a local classifier, or when the client asks for
//! online mode explicitly.

pub mod client;
pub mod fallback;
pub mod prompt;
pub mod retry;

pub use client::{GeminiClient, InlineImage, UpstreamError, VisionModel};
pub use fallback::{OnlineAnalysis, OnlineVisionFallback};
pub use retry::RetryPolicy;
