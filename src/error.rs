//! Error taxonomy shared by the indexing and retrieval pipeline.
//!
//! Every failure that terminates a build or a retrieval call is one of the
//! four [`ErrorKind`]s. Collaborator failures (embedding service, vector
//! store, answer generator) are wrapped in [`DependencyError`] and are never
//! retried here.
use std::path::PathBuf;

use thiserror::Error;

use crate::answer::GenerationError;
use crate::db::StoreError;
use crate::embedder::EmbedderError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors surfaced by the loader, index builder and retriever.
#[derive(Error, Debug)]
pub enum RagError {
    /// A required external resource is missing or unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The documents directory holds no eligible files.
    #[error("no eligible documents found in {}", .dir.display())]
    EmptyCorpus { dir: PathBuf },

    /// Chunking produced nothing to index.
    #[error("chunking produced no chunks from {documents} document(s)")]
    EmptyIndex { documents: usize },

    /// An external service call failed.
    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

/// Failures of the opaque collaborators.
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("embedding service failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("vector store failed: {0}")]
    Store(#[from] StoreError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    EmptyCorpus,
    EmptyIndex,
    Dependency,
}

impl ErrorKind {
    /// Process exit status used by the maintenance command.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::EmptyCorpus => 3,
            Self::EmptyIndex => 4,
            Self::Dependency => 5,
        }
    }
}

impl RagError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::EmptyCorpus { .. } => ErrorKind::EmptyCorpus,
            Self::EmptyIndex { .. } => ErrorKind::EmptyIndex,
            Self::Dependency(_) => ErrorKind::Dependency,
        }
    }
}

impl From<EmbedderError> for RagError {
    fn from(e: EmbedderError) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<StoreError> for RagError {
    fn from(e: StoreError) -> Self {
        Self::Dependency(e.into())
    }
}

impl From<GenerationError> for RagError {
    fn from(e: GenerationError) -> Self {
        Self::Dependency(e.into())
    }
}
