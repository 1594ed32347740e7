//! Chunking and index construction.
pub mod builder;
pub mod chunker;

pub use builder::{BuildReport, IndexBuilder};
pub use chunker::{ChunkSettings, chunk_text};
