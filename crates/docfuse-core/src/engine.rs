//! Ingestion and query entry points.
//!
//! [`RetrievalEngine`] ties a [`DocumentStore`] to an embedding provider
//! and a text extractor. It never holds the store lock while awaiting the
//! provider.
//!
//! # Ingestion
//!
//! 1. Hash the raw bytes; a known file hash short-circuits as
//!    `DuplicateFile` before any extraction.
//! 2. Extract text for the declared type (the lower-cased extension).
//! 3. Whitespace-only text is `EmptyContent`.
//! 4. Admit atomically on both hashes. A `New` decision holds a
//!    reservation that is released if anything below fails or the future
//!    is dropped.
//! 5. Chunk, embed in batches, commit.
//!
//! If embedding fails, [`EmbeddingFailurePolicy`] decides between
//! admitting the document for keyword search only and rejecting it.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunk::{chunk_document, ChunkParams};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RetrievalError};
use crate::guard::{content_hash, file_hash, normalize_text, AdmissionDecision, Fingerprint};
use crate::models::{
    CorpusStats, DeleteOutcome, DocId, Document, IngestOutcome, IngestStatus, StoredDocument,
};
use crate::search::{rank, SearchHit, SearchParams, SearchRequest};
use crate::store::DocumentStore;
use crate::vector::{embed_chunks, embed_query, DEFAULT_EMBED_BATCH};

/// Turns raw bytes of a declared type into plain text.
pub trait TextExtractor: Send + Sync {
    /// `declared_type` is a lower-case file extension such as `"pdf"`, or
    /// empty when the filename has none.
    fn extract(&self, raw: &[u8], declared_type: &str) -> anyhow::Result<String>;
}

/// What to do with a document whose chunks could not be embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingFailurePolicy {
    /// Admit it without vectors; it is still found by keyword search.
    #[default]
    KeywordOnly,
    /// Report `ProviderUnavailable` and admit nothing.
    Reject,
}

#[derive(Debug, Clone)]
pub struct EngineParams {
    pub chunking: ChunkParams,
    pub search: SearchParams,
    pub embed_batch_size: usize,
    pub on_embedding_failure: EmbeddingFailurePolicy,
}

impl EngineParams {
    pub fn new(chunking: ChunkParams, search: SearchParams) -> Self {
        Self {
            chunking,
            search,
            embed_batch_size: DEFAULT_EMBED_BATCH,
            on_embedding_failure: EmbeddingFailurePolicy::default(),
        }
    }
}

impl Default for EngineParams {
    fn default() -> Self {
        Self::new(ChunkParams::default(), SearchParams::default())
    }
}

/// Raw upload plus the metadata carried into citations.
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest<'a> {
    pub raw: &'a [u8],
    pub filename: &'a str,
    pub source: Option<&'a str>,
}

/// Lower-cased extension of `filename`, or `""`.
pub fn declared_type(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Releases an admission reservation unless confirmed.
struct Reservation<'a> {
    store: &'a DocumentStore,
    doc_id: DocId,
    fingerprint: Fingerprint,
    armed: bool,
}

impl<'a> Reservation<'a> {
    fn new(store: &'a DocumentStore, doc_id: DocId, fingerprint: Fingerprint) -> Self {
        Self {
            store,
            doc_id,
            fingerprint,
            armed: true,
        }
    }

    fn confirm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(doc_id = %self.doc_id, "releasing admission reservation");
            self.store.release(&self.doc_id, &self.fingerprint);
        }
    }
}

pub struct RetrievalEngine {
    store: Arc<DocumentStore>,
    provider: Arc<dyn EmbeddingProvider>,
    extractor: Arc<dyn TextExtractor>,
    params: EngineParams,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<DocumentStore>,
        provider: Arc<dyn EmbeddingProvider>,
        extractor: Arc<dyn TextExtractor>,
        params: EngineParams,
    ) -> Self {
        Self {
            store,
            provider,
            extractor,
            params,
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Ingest one upload.
    ///
    /// Duplicates, empty extractions and rejected embeddings are reported
    /// through [`IngestOutcome::status`]; errors are reserved for
    /// extraction failures and store inconsistencies.
    pub async fn ingest(&self, req: IngestRequest<'_>) -> Result<IngestOutcome> {
        let raw_hash = file_hash(req.raw);
        if let Some(existing) = self.store.find_by_file_hash(&raw_hash) {
            tracing::info!(filename = req.filename, existing = %existing, "duplicate file skipped");
            let chunks = self.store.chunk_count(&existing);
            return Ok(IngestOutcome::duplicate(IngestStatus::DuplicateFile, existing, chunks));
        }

        let kind = declared_type(req.filename);
        let text = self
            .extractor
            .extract(req.raw, &kind)
            .map_err(|e| RetrievalError::Extraction(format!("{}: {:#}", req.filename, e)))?;

        let normalized = normalize_text(&text);
        if normalized.is_empty() {
            tracing::info!(filename = req.filename, "no extractable text");
            return Ok(IngestOutcome::without_document(IngestStatus::EmptyContent));
        }

        let fingerprint = Fingerprint {
            file_hash: raw_hash,
            content_hash: content_hash(&normalized),
        };
        let doc_id = match self.store.admit(&fingerprint) {
            AdmissionDecision::New(id) => id,
            AdmissionDecision::DuplicateFile(existing) => {
                tracing::info!(filename = req.filename, existing = %existing, "duplicate file skipped");
                let chunks = self.store.chunk_count(&existing);
                return Ok(IngestOutcome::duplicate(IngestStatus::DuplicateFile, existing, chunks));
            }
            AdmissionDecision::DuplicateContent(existing) => {
                tracing::info!(filename = req.filename, existing = %existing, "duplicate content skipped");
                let chunks = self.store.chunk_count(&existing);
                return Ok(IngestOutcome::duplicate(
                    IngestStatus::DuplicateContent,
                    existing,
                    chunks,
                ));
            }
        };
        let reservation = Reservation::new(&self.store, doc_id.clone(), fingerprint.clone());

        let mut chunks = chunk_document(&doc_id, &text, &self.params.chunking);

        let keyword_only =
            match embed_chunks(self.provider.as_ref(), &mut chunks, self.params.embed_batch_size)
                .await
            {
                Ok(()) => false,
                Err(e) => match self.params.on_embedding_failure {
                    EmbeddingFailurePolicy::Reject => {
                        tracing::warn!(filename = req.filename, error = %e, "embedding failed; document rejected");
                        return Ok(IngestOutcome::without_document(
                            IngestStatus::ProviderUnavailable,
                        ));
                    }
                    EmbeddingFailurePolicy::KeywordOnly => {
                        if self.provider.is_available() {
                            tracing::warn!(filename = req.filename, error = %e, "embedding failed; admitting for keyword search only");
                        } else {
                            tracing::debug!(filename = req.filename, "no embedding provider; keyword search only");
                        }
                        for chunk in &mut chunks {
                            chunk.embedding = None;
                        }
                        true
                    }
                },
            };

        let chunk_count = chunks.len();
        let document = Document {
            id: doc_id.clone(),
            filename: req.filename.to_string(),
            source: req.source.map(str::to_string),
            file_hash: fingerprint.file_hash,
            content_hash: fingerprint.content_hash,
            created_at: chrono::Utc::now().timestamp(),
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
            keyword_only,
        };
        self.store.commit(document, chunks)?;
        reservation.confirm();

        tracing::info!(doc_id = %doc_id, filename = req.filename, chunks = chunk_count, keyword_only, "document ingested");
        Ok(IngestOutcome {
            status: IngestStatus::New,
            doc_id: Some(doc_id),
            chunk_count,
            keyword_only,
        })
    }

    /// Search the corpus. Never fails: a missing query embedding only
    /// removes the vector side.
    pub async fn search(&self, req: &SearchRequest<'_>) -> Vec<SearchHit> {
        if req.query.trim().is_empty() || req.limit == 0 {
            return Vec::new();
        }

        let query_vec = if req.mode.uses_vectors() {
            embed_query(self.provider.as_ref(), req.query).await
        } else {
            None
        };

        let corpus = self.store.read();
        let hits = rank(&corpus, req, query_vec.as_deref(), &self.params.search);
        tracing::debug!(query = req.query, mode = %req.mode, hits = hits.len(), "search complete");
        hits
    }

    pub fn delete(&self, doc_id: &DocId) -> Result<DeleteOutcome> {
        let removed = self.store.delete(doc_id)?;
        Ok(DeleteOutcome {
            found: removed.is_some(),
        })
    }

    pub fn get(&self, doc_id: &DocId) -> Option<StoredDocument> {
        self.store.get(doc_id)
    }

    pub fn list(&self) -> Vec<Document> {
        self.store.list()
    }

    pub fn stats(&self) -> CorpusStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchMode;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract(&self, raw: &[u8], _declared_type: &str) -> anyhow::Result<String> {
            Ok(String::from_utf8(raw.to_vec())?)
        }
    }

    struct DownProvider;

    #[async_trait]
    impl EmbeddingProvider for DownProvider {
        fn model_name(&self) -> &str {
            "down"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("503 Service Unavailable")
        }
    }

    fn engine() -> RetrievalEngine {
        RetrievalEngine::new(
            Arc::new(DocumentStore::new()),
            Arc::new(DownProvider),
            Arc::new(Utf8Extractor),
            EngineParams::default(),
        )
    }

    #[traced_test]
    #[tokio::test]
    async fn test_embedding_failure_is_logged_and_degrades() {
        let engine = engine();
        let outcome = engine
            .ingest(IngestRequest {
                raw: b"Invoices are due in thirty days.",
                filename: "terms.txt",
                source: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome.status, IngestStatus::New);
        assert!(outcome.keyword_only);
        assert!(logs_contain("admitting for keyword search only"));

        let hits = engine
            .search(&SearchRequest {
                query: "invoices",
                mode: SearchMode::Hybrid,
                limit: 5,
                explain: true,
            })
            .await;
        assert_eq!(hits.len(), 1);
        assert!(logs_contain("query embedding failed"));
        let explain = hits[0].explain.as_ref().unwrap();
        assert!(explain.vector_degraded);
        assert_eq!(explain.vector_candidates, 0);
        assert_eq!(explain.keyword_weight, 1.0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_extraction_error() {
        let err = engine()
            .ingest(IngestRequest {
                raw: &[0xff, 0xfe, 0xfd],
                filename: "bad.txt",
                source: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::Extraction(ref m) if m.starts_with("bad.txt")));
    }

    #[test]
    fn test_declared_type() {
        assert_eq!(declared_type("Report.PDF"), "pdf");
        assert_eq!(declared_type("notes.tar.gz"), "gz");
        assert_eq!(declared_type("README"), "");
        assert_eq!(declared_type("dir/file.md"), "md");
    }

    #[test]
    fn test_reservation_released_on_drop() {
        let store = DocumentStore::new();
        let fp = Fingerprint::compute(b"raw", "text");
        let AdmissionDecision::New(id) = store.admit(&fp) else {
            panic!("expected New");
        };
        {
            let _reservation = Reservation::new(&store, id.clone(), fp.clone());
        }
        assert!(store.find_by_file_hash(&fp.file_hash).is_none());
        assert!(!store.read().guard().is_pending(&id));
    }

    #[test]
    fn test_confirmed_reservation_is_kept() {
        let store = DocumentStore::new();
        let fp = Fingerprint::compute(b"raw", "text");
        let AdmissionDecision::New(id) = store.admit(&fp) else {
            panic!("expected New");
        };
        Reservation::new(&store, id.clone(), fp.clone()).confirm();
        assert_eq!(store.find_by_file_hash(&fp.file_hash), Some(id));
    }

    #[test]
    fn test_policy_serde_names() {
        let p: EmbeddingFailurePolicy = serde_json::from_str("\"keyword_only\"").unwrap();
        assert_eq!(p, EmbeddingFailurePolicy::KeywordOnly);
        let p: EmbeddingFailurePolicy = serde_json::from_str("\"reject\"").unwrap();
        assert_eq!(p, EmbeddingFailurePolicy::Reject);
    }
}
