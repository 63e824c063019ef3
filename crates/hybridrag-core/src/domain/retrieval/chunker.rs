//! Fixed-width overlapping chunking

use crate::config::IndexingSettings;
use crate::error::{Error, Result};

/// Default chunk width, in characters
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks, in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Splits text into windows of `chunk_size` characters, each starting
/// `chunk_size - overlap` characters after the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Create a chunker. Fails unless `0 <= overlap < chunk_size`, since the
    /// window would never advance otherwise.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::ConfigError("chunk_size must be positive".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::ConfigError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_settings(settings: IndexingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `content` into overlapping chunks
    pub fn chunk(&self, content: &str) -> Vec<String> {
        // Byte offset of every char, plus the end, so windows never split a code point
        let mut boundaries: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
        let char_count = boundaries.len();
        boundaries.push(content.len());

        if char_count <= self.chunk_size {
            return vec![content.to_string()];
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(content[boundaries[start]..boundaries[end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }

        chunks
    }
}
