//! Error taxonomy for the retrieval core.
//!
//! Only genuine failures live here. Admission outcomes such as duplicate
//! files or empty extractions are reported through
//! [`IngestStatus`](crate::models::IngestStatus) instead, so callers branch
//! on data rather than on errors.

use crate::models::{ChunkId, DocId};

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Chunk window parameters that would not advance through the text.
    #[error("invalid chunk parameters: target_size={target_size}, overlap={overlap} (need target_size > 0 and overlap < target_size)")]
    InvalidChunkParameters { target_size: usize, overlap: usize },

    /// The embedding provider is disabled, failed, or timed out.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingProviderUnavailable(String),

    /// Store, keyword index and vector index disagree about a document.
    #[error("index corruption for document {doc_id}: {detail}")]
    IndexCorruption { doc_id: DocId, detail: String },

    /// A vector does not match the dimensionality already stored.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A vector with a NaN or infinite component.
    #[error("embedding for chunk {0} has non-finite components")]
    NonFiniteEmbedding(ChunkId),

    /// A commit targeted a document id that is already present.
    #[error("document already committed: {0}")]
    DuplicateDocument(DocId),

    /// Text extraction failed (unsupported type, corrupt file).
    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("unknown search mode: '{0}'. Use keyword, vector, or hybrid.")]
    UnknownSearchMode(String),
}
