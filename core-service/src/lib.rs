//! CropDoc Core - crop disease inference and agriculture Q&A
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  DISEASE INFERENCE SERVICE                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  offline:  Preprocessor → Classifier → Severity → Treatments │
//! │  online:   Online Vision Fallback (hosted vision model)      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  RAG:  embed → vector search → grounded prompt → chat model  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod constants;
pub mod logic;

pub use logic::detection::{
    DetectionFailure, DetectionMode, DetectionRequest, DetectionResult, DiseaseInferenceService,
    HealthReport, HealthStatus, ServiceInfo,
};
pub use logic::error::{DetectionError, ErrorKind};
