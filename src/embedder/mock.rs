//! Mock embedder for tests and offline runs.
//!
//! Generates deterministic embeddings from a hash of the text, so identical
//! text always maps to the identical unit vector.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{Embedder, EmbedderError};

/// A mock embedder that produces deterministic vectors from text hashes.
pub struct MockEmbedder {
    pub dimensions: usize,
}

impl MockEmbedder {
    /// Create a new `MockEmbedder` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut embedding = Vec::with_capacity(self.dimensions);

        // One hash per 8 dimensions so long vectors don't just repeat 8 values
        let mut block = [0u8; 8];
        for i in 0..self.dimensions {
            if i % 8 == 0 {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                (i / 8).hash(&mut hasher);
                block = hasher.finish().to_le_bytes();
            }
            embedding.push(f32::from(block[i % 8]) / 255.0 - 0.5);
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
