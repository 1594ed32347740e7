//! Embedder trait and shared types for text embedding.
//!
//! The embedding model is an external service; everything past this trait
//! treats vectors as opaque fixed-dimension `f32` slices.
pub mod mock;
pub mod openai;

use std::sync::Arc;

use thiserror::Error;

use crate::config::EmbeddingConfig;
use crate::error::RagError;

/// Errors that can occur during embedding operations.
#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("expected {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Trait for text embedding implementations.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embed multiple text strings into vectors, preserving order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Build the embedder selected by `cfg.provider`.
pub fn from_config(cfg: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, RagError> {
    match cfg.provider.as_str() {
        "mock" => Ok(Arc::new(mock::MockEmbedder::new(cfg.dimensions))),
        "openai" => Ok(Arc::new(openai::OpenAiEmbedder::from_config(cfg)?)),
        other => Err(RagError::Configuration(format!(
            "unknown embedding provider `{other}` (expected `openai` or `mock`)"
        ))),
    }
}
