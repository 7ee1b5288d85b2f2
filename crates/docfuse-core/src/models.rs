//! Core data models for the retrieval pipeline.
//!
//! Documents own an ordered list of chunk ids; chunks are the unit of
//! indexing and retrieval. Chunk ids are derived from the document id and
//! the chunk's ordinal so that re-chunking the same text reproduces them.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// Opaque document identifier, assigned once at admission.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

const CHUNK_SEPARATOR: &str = "::chunk::";

/// Deterministic chunk identifier: `<doc_id>::chunk::<index>`.
///
/// Orders by document id first and then by numeric index, so chunk 2
/// sorts before chunk 10 and all chunks of a document are contiguous in
/// ordered collections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId {
    doc_id: DocId,
    index: usize,
}

impl ChunkId {
    pub fn new(doc_id: &DocId, index: usize) -> Self {
        Self {
            doc_id: doc_id.clone(),
            index,
        }
    }

    pub fn doc_id(&self) -> &DocId {
        &self.doc_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Parse the textual form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let (doc, index) = s.rsplit_once(CHUNK_SEPARATOR)?;
        if doc.is_empty() {
            return None;
        }
        let index = index.parse().ok()?;
        Some(Self {
            doc_id: DocId::from(doc),
            index,
        })
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.doc_id, CHUNK_SEPARATOR, self.index)
    }
}

impl Serialize for ChunkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChunkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ChunkId::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid chunk id: {}", raw)))
    }
}

/// An admitted, immutable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub filename: String,
    /// Where the bytes came from (file path, upload reference), for citations.
    pub source: Option<String>,
    /// SHA-256 of the raw bytes.
    pub file_hash: String,
    /// SHA-256 of the normalized extracted text.
    pub content_hash: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub chunk_ids: Vec<ChunkId>,
    /// Admitted without vectors because embedding failed at ingest time.
    pub keyword_only: bool,
}

/// A window of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn doc_id(&self) -> &DocId {
        self.id.doc_id()
    }

    pub fn index(&self) -> usize {
        self.id.index()
    }
}

/// Citation metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMeta {
    pub doc_id: DocId,
    pub filename: String,
    pub chunk_index: usize,
    pub source: Option<String>,
    pub ingested_at: i64,
}

impl ChunkMeta {
    pub fn for_chunk(document: &Document, chunk: &Chunk) -> Self {
        Self {
            doc_id: document.id.clone(),
            filename: document.filename.clone(),
            chunk_index: chunk.index(),
            source: document.source.clone(),
            ingested_at: document.created_at,
        }
    }
}

/// A document together with its chunks in index order.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

/// Outcome category of an ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Admitted and committed.
    New,
    /// Byte-identical to an existing document.
    DuplicateFile,
    /// Different bytes, same normalized text as an existing document.
    DuplicateContent,
    /// Extraction produced nothing usable.
    EmptyContent,
    /// Embedding failed and the policy rejects keyword-only documents.
    ProviderUnavailable,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::New => "new",
            IngestStatus::DuplicateFile => "duplicate_file",
            IngestStatus::DuplicateContent => "duplicate_content",
            IngestStatus::EmptyContent => "empty_content",
            IngestStatus::ProviderUnavailable => "provider_unavailable",
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    /// New id for `New`, the existing id for duplicates, otherwise `None`.
    pub doc_id: Option<DocId>,
    pub chunk_count: usize,
    pub keyword_only: bool,
}

impl IngestOutcome {
    pub(crate) fn without_document(status: IngestStatus) -> Self {
        Self {
            status,
            doc_id: None,
            chunk_count: 0,
            keyword_only: false,
        }
    }

    pub(crate) fn duplicate(status: IngestStatus, existing: DocId, chunk_count: usize) -> Self {
        Self {
            status,
            doc_id: Some(existing),
            chunk_count,
            keyword_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub found: bool,
}

/// Corpus counters reported by `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub document_count: usize,
    pub chunk_count: usize,
    /// Distinct terms in the keyword index.
    pub token_count: usize,
    pub embedded_chunk_count: usize,
    pub keyword_only_documents: usize,
}

/// Format a Unix timestamp as ISO 8601.
pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
