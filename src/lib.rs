//! # docrag: document question answering core
//!
//! Indexes a directory of plain-text documents into a persistent vector
//! index and answers questions against it by top-k similarity retrieval.
//!
//! ## Architecture
//!
//! - **[`config`]**: JSON configuration loading and validation
//! - **[`loader`]**: Reads eligible documents from the documents directory
//! - **[`indexer`]**: Sliding-window chunking and full index rebuilds
//! - **[`embedder`]**: Text embedding (OpenAI-compatible HTTP, deterministic mock)
//! - **[`db`]**: SQLite + sqlite-vec vector store with named collections
//! - **[`retriever`]**: Question embedding, top-k lookup, distance-to-score
//! - **[`answer`]**: Context formatting and answer generation boundary
//! - **[`server`]**: HTTP surface (`/health`, `/api/ask`)
//! - **[`error`]**: Error taxonomy and exit codes

pub mod answer;
pub mod config;
pub mod db;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod retriever;
pub mod server;

pub use error::{DependencyError, ErrorKind, RagError, Result};
