//! Model Module - Per-Crop Image Classifiers
//!
//! One classifier per crop, behind a common trait so the ONNX engine and the
//! deterministic mock are interchangeable at construction time.

pub mod inference;
pub mod onnx;
pub mod mock;
pub mod threshold;
pub mod registry;

// Re-export common types
pub use inference::{ClassifierDescription, CropClassifier, ModelError, RankedClass};
pub use registry::{ClassifierFactory, ClassifierInfo, LoadFailure, LoadedClassifier, ModelRegistry};
pub use threshold::{SeverityLevel, SeverityThresholds};
