//! RAG Module - Agriculture Q&A
//!
//! Glue over hosted collaborators: embeddings, a Qdrant collection, an
//! OpenAI-compatible chat model and speech-to-text.

pub mod types;
pub mod providers;
pub mod engine;

pub use engine::RagQueryService;
pub use providers::{ChatModel, Embedder, SpeechToText, VectorStore};
pub use types::{KnowledgeRecord, RagAnswer, RagError, RagQuery, RagSource, SearchHit};
