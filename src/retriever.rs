//! Top-k similarity retrieval over the persisted index.
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::db::{ChunkMetadata, StoreError, VectorStore};
use crate::embedder::Embedder;
use crate::error::Result;

/// One retrieved chunk with its relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedItem {
    pub content: String,
    pub metadata: ChunkMetadata,
    pub score: f64,
}

/// Converts a cosine distance into a relevance score.
///
/// Only meaningful for distances roughly within `[0, 2]`; it is a ranking
/// aid, not a probability.
#[must_use]
pub fn distance_to_score(distance: f64) -> f64 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Embeds questions and looks them up in the vector store.
///
/// Built once at startup and shared immutably afterwards.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    /// Replaces the default `top_k` used by [`Retriever::retrieve`].
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Most relevant chunks for `question`, best first, at most `top_k`.
    ///
    /// An empty result is a valid answer, not an error.
    pub fn retrieve(&self, question: &str) -> Result<Vec<RetrievedItem>> {
        self.retrieve_top(question, self.top_k)
    }

    /// Same as [`Retriever::retrieve`] with an explicit `top_k`.
    pub fn retrieve_top(&self, question: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        let query_vector = self.embedder.embed(question)?;
        let result = self.store.query(&[query_vector], top_k)?;

        // One query vector, so only the first inner list matters
        let documents = result.documents.into_iter().next().unwrap_or_default();
        let metadatas = result.metadatas.into_iter().next().unwrap_or_default();
        let distances = result.distances.into_iter().next().unwrap_or_default();

        if documents.len() != metadatas.len() || documents.len() != distances.len() {
            return Err(StoreError::MalformedResult(format!(
                "{} documents, {} metadatas, {} distances",
                documents.len(),
                metadatas.len(),
                distances.len()
            ))
            .into());
        }

        let items: Vec<RetrievedItem> = documents
            .into_iter()
            .zip(metadatas)
            .zip(distances)
            .take(top_k)
            .map(|((content, metadata), distance)| RetrievedItem {
                content,
                metadata,
                score: distance_to_score(distance),
            })
            .collect();

        debug!("Retrieved {} item(s) for query", items.len());
        Ok(items)
    }
}
