//! Logic Module - Inference Engines & Services
//!
//! - `preprocess` - base64 image → model input tensor
//! - `model/` - per-crop classifiers, severity thresholds, registry
//! - `treatment` - disease → remediation catalog
//! - `online/` - hosted vision model fallback
//! - `detection/` - orchestrator tying the above together
//! - `rag/` - agriculture Q&A over a vector store + chat model

pub mod config;
pub mod error;
pub mod preprocess;
pub mod model;
pub mod treatment;
pub mod online;
pub mod detection;
pub mod rag;
