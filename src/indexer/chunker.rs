use crate::error::RagError;

/// Window size and overlap for fixed-size chunking, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkSettings {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RagError> {
        if chunk_size == 0 {
            return Err(RagError::Configuration(
                "chunk_size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RagError::Configuration(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Distance between the starts of two consecutive chunks.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

/// Half-open character range `[start, end)` of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub start: usize,
    pub end: usize,
}

impl ChunkSpan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Computes the chunk windows for a text of `char_len` characters.
///
/// Each window starts `overlap` characters before the previous one ended;
/// the last window ends exactly at `char_len`. An empty text has no windows.
#[must_use]
pub fn chunk_spans(char_len: usize, settings: ChunkSettings) -> Vec<ChunkSpan> {
    let mut spans = Vec::new();
    let mut start = 0;

    while start < char_len {
        let end = (start + settings.chunk_size).min(char_len);
        spans.push(ChunkSpan { start, end });
        if end == char_len {
            break;
        }
        // overlap < chunk_size, so this always moves forward
        start = end - settings.overlap;
    }

    spans
}

/// Splits `text` into overlapping chunks of at most `chunk_size` characters.
#[must_use]
pub fn chunk_text(text: &str, settings: ChunkSettings) -> Vec<String> {
    // byte offset of every char boundary, including the end of the string
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let char_len = bounds.len() - 1;

    chunk_spans(char_len, settings)
        .into_iter()
        .map(|span| text[bounds[span.start]..bounds[span.end]].to_string())
        .collect()
}
