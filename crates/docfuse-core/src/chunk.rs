//! Sliding-window text chunker.
//!
//! Splits document text into overlapping windows measured either in
//! characters or in whitespace-delimited words. The unit is fixed per
//! deployment through configuration so chunk boundaries stay comparable
//! across the whole corpus.
//!
//! # Algorithm
//!
//! 1. Measure the text in the configured unit.
//! 2. Emit a window of `target_size` units starting at offset 0.
//! 3. Advance by `target_size - overlap` (never less than 1) and repeat.
//! 4. Stop as soon as a window reaches the end of the text; the last
//!    window may be shorter than `target_size`.
//!
//! Character windows are cut on `char` boundaries, so multi-byte UTF-8
//! sequences are never split. Word windows re-join their words with a
//! single space.
//!
//! # Example
//!
//! ```rust
//! use docfuse_core::chunk::{split_text, ChunkUnit};
//!
//! let pieces = split_text("abcdefghij", 4, 1, ChunkUnit::Chars);
//! assert_eq!(pieces, vec!["abcd", "defg", "ghij"]);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, RetrievalError};
use crate::models::{Chunk, ChunkId, DocId};

pub const DEFAULT_TARGET_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 200;

/// Unit in which chunk sizes are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkUnit {
    Words,
    #[default]
    Chars,
}

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    target_size: usize,
    overlap: usize,
    unit: ChunkUnit,
}

impl ChunkParams {
    /// Rejects windows that would not advance: `target_size` must be
    /// positive and `overlap` strictly smaller.
    pub fn new(target_size: usize, overlap: usize, unit: ChunkUnit) -> Result<Self> {
        if target_size == 0 || overlap >= target_size {
            return Err(RetrievalError::InvalidChunkParameters {
                target_size,
                overlap,
            });
        }
        Ok(Self {
            target_size,
            overlap,
            unit,
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn unit(&self) -> ChunkUnit {
        self.unit
    }

    pub fn step(&self) -> usize {
        step(self.target_size, self.overlap)
    }
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
            unit: ChunkUnit::Chars,
        }
    }
}

fn step(target_size: usize, overlap: usize) -> usize {
    target_size.saturating_sub(overlap).max(1)
}

/// Split `text` into overlapping windows.
///
/// Returns an empty vector for empty text and a single window equal to the
/// whole text when it is shorter than `target_size`. Unvalidated sizes are
/// tolerated: a zero target is treated as 1 and the step never drops
/// below 1.
pub fn split_text(text: &str, target_size: usize, overlap: usize, unit: ChunkUnit) -> Vec<String> {
    let target = target_size.max(1);
    let step = step(target, overlap);
    match unit {
        ChunkUnit::Chars => split_chars(text, target, step),
        ChunkUnit::Words => split_words(text, target, step),
    }
}

fn split_chars(text: &str, target: usize, step: usize) -> Vec<String> {
    // Byte offset of every char start, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let n = bounds.len();
    if n == 0 {
        return Vec::new();
    }
    bounds.push(text.len());

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + target).min(n);
        pieces.push(text[bounds[start]..bounds[end]].to_string());
        if end == n {
            break;
        }
        start += step;
    }
    pieces
}

fn split_words(text: &str, target: usize, step: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let n = words.len();
    if n == 0 {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + target).min(n);
        pieces.push(words[start..end].join(" "));
        if end == n {
            break;
        }
        start += step;
    }
    pieces
}

/// Chunk a document's text into [`Chunk`] records with deterministic ids.
pub fn chunk_document(doc_id: &DocId, text: &str, params: &ChunkParams) -> Vec<Chunk> {
    split_text(text, params.target_size, params.overlap, params.unit)
        .into_iter()
        .enumerate()
        .map(|(index, piece)| make_chunk(doc_id, index, piece))
        .collect()
}

fn make_chunk(doc_id: &DocId, index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: ChunkId::new(doc_id, index),
        text,
        hash,
        embedding: None,
    }
}
