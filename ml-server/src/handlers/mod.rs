//! HTTP Handlers

pub mod health;
pub mod detection;
pub mod rag;
