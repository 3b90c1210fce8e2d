//! Detection Module - Disease Inference Orchestrator
//!
//! # Architecture
//! - `types.rs`: request, result, failure, health and info payloads
//! - `service.rs`: `DiseaseInferenceService`, offline/online routing
//!
//! # Failure Strategy
//! A crop whose classifier fails to load is left out of the registry; the
//! service keeps serving the others.

pub mod types;
pub mod service;
#[cfg(test)]
mod tests;

pub use service::{DiseaseInferenceService, ServiceBuilder};
pub use types::{
    DetectionFailure, DetectionMode, DetectionRequest, DetectionResult, HealthReport, HealthStatus,
    OfflineDetection, OnlineDetection, Prediction, ServiceInfo,
};
