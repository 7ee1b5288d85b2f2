//! Document store owning the corpus and its indexes.
//!
//! A [`DocumentStore`] is an ordinary value: create as many as needed and
//! inject them where they are used. It owns one `RwLock` over the whole
//! [`Corpus`], so a commit or delete updates the records, the keyword
//! index, the vector index and the duplicate guard in a single step.
//! Readers see either the state before or the state after, never a mix.
//!
//! Lock guards are never held across an `.await`; embedding happens
//! before [`commit`](DocumentStore::commit) is called.

mod corpus;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use corpus::Corpus;

use crate::error::Result;
use crate::guard::{AdmissionDecision, Fingerprint};
use crate::models::{Chunk, CorpusStats, DocId, Document, StoredDocument};

#[derive(Debug, Default)]
pub struct DocumentStore {
    inner: RwLock<Corpus>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared read access for searching. Poisoned locks are recovered;
    /// mutations validate before they write.
    pub fn read(&self) -> RwLockReadGuard<'_, Corpus> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Corpus> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Existing (or reserved) document with these exact bytes.
    pub fn find_by_file_hash(&self, file_hash: &str) -> Option<DocId> {
        self.read().guard.find_by_file_hash(file_hash).cloned()
    }

    /// Atomic insert-if-absent admission; see [`DuplicateGuard::admit`](crate::guard::DuplicateGuard::admit).
    pub fn admit(&self, fingerprint: &Fingerprint) -> AdmissionDecision {
        self.write().guard.admit(fingerprint)
    }

    /// Give back a reservation that will not be committed.
    pub fn release(&self, doc_id: &DocId, fingerprint: &Fingerprint) {
        self.write().guard.release(doc_id, fingerprint);
    }

    /// Add a fully prepared document and its chunks.
    ///
    /// Everything is validated before anything changes: the id must be new,
    /// the chunks must match `document.chunk_ids`, and every embedding must
    /// match the stored dimensionality.
    pub fn commit(&self, document: Document, chunks: Vec<Chunk>) -> Result<()> {
        let doc_id = document.id.clone();
        let count = chunks.len();
        self.write().insert(document, chunks)?;
        tracing::info!(doc_id = %doc_id, chunks = count, "document committed");
        Ok(())
    }

    /// Load a previously persisted document. Same validation as [`commit`](Self::commit).
    pub fn restore(&self, document: Document, chunks: Vec<Chunk>) -> Result<()> {
        let doc_id = document.id.clone();
        self.write().insert(document, chunks)?;
        tracing::debug!(doc_id = %doc_id, "document restored");
        Ok(())
    }

    pub fn get(&self, doc_id: &DocId) -> Option<StoredDocument> {
        self.read().assemble(doc_id)
    }

    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.read().documents.contains_key(doc_id)
    }

    pub fn chunk_count(&self, doc_id: &DocId) -> usize {
        self.read()
            .document(doc_id)
            .map_or(0, |d| d.chunk_ids.len())
    }

    /// Remove a document from the store and both indexes.
    ///
    /// Returns the removed document, or `None` if it did not exist. Fails
    /// with `IndexCorruption`, removing nothing, if the indexes disagree
    /// about the document's chunks.
    pub fn delete(&self, doc_id: &DocId) -> Result<Option<Document>> {
        let removed = self.write().remove(doc_id)?;
        if removed.is_some() {
            tracing::info!(doc_id = %doc_id, "document deleted");
        }
        Ok(removed)
    }

    /// All documents, oldest first (ties by id).
    pub fn list(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self.read().documents().cloned().collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        docs
    }

    pub fn stats(&self) -> CorpusStats {
        self.read().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_document, ChunkParams, ChunkUnit};
    use crate::error::RetrievalError;
    use crate::models::ChunkId;

    fn prepared(store: &DocumentStore, raw: &str, text: &str, embed: bool) -> (Document, Vec<Chunk>) {
        let fp = Fingerprint::compute(raw.as_bytes(), text);
        let AdmissionDecision::New(id) = store.admit(&fp) else {
            panic!("expected New");
        };
        let params = ChunkParams::new(16, 4, ChunkUnit::Chars).unwrap();
        let mut chunks = chunk_document(&id, text, &params);
        if embed {
            for (i, c) in chunks.iter_mut().enumerate() {
                c.embedding = Some(vec![1.0, i as f32]);
            }
        }
        let document = Document {
            id,
            filename: format!("{}.txt", raw),
            source: None,
            file_hash: fp.file_hash,
            content_hash: fp.content_hash,
            created_at: 100,
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
            keyword_only: !embed,
        };
        (document, chunks)
    }

    #[test]
    fn test_commit_get_roundtrip() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "quarterly revenue report for the board", true);
        let id = doc.id.clone();
        store.commit(doc, chunks.clone()).unwrap();

        let stored = store.get(&id).unwrap();
        assert_eq!(stored.chunks, chunks);
        assert!(!stored.document.keyword_only);
        assert!(!store.read().guard().is_pending(&id));

        let stats = store.stats();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, chunks.len());
        assert_eq!(stats.embedded_chunk_count, chunks.len());
        assert!(stats.token_count > 0);
    }

    #[test]
    fn test_commit_rejects_existing_id() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "some text here", false);
        store.commit(doc.clone(), chunks.clone()).unwrap();
        let err = store.commit(doc, chunks).unwrap_err();
        assert!(matches!(err, RetrievalError::DuplicateDocument(_)));
        assert_eq!(store.stats().document_count, 1);
    }

    #[test]
    fn test_commit_rejects_mismatched_chunks() {
        let store = DocumentStore::new();
        let (doc, mut chunks) = prepared(&store, "a", "a longer body of text to split up", false);
        chunks.pop();
        let err = store.commit(doc, chunks).unwrap_err();
        assert!(matches!(err, RetrievalError::IndexCorruption { .. }));
        assert_eq!(store.stats(), CorpusStats::default());
    }

    #[test]
    fn test_commit_rejects_dimension_mismatch_without_side_effects() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "first document body", true);
        store.commit(doc, chunks).unwrap();

        let (doc2, mut chunks2) = prepared(&store, "b", "second document body", true);
        for c in &mut chunks2 {
            c.embedding = Some(vec![1.0, 2.0, 3.0]);
        }
        let id2 = doc2.id.clone();
        let err = store.commit(doc2, chunks2).unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(store.get(&id2).is_none());
        assert!(store.read().keyword().chunk_ids_for(&id2).is_none());
    }

    #[test]
    fn test_delete_removes_everywhere() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "alpha beta gamma delta epsilon", true);
        let id = doc.id.clone();
        let file_hash = doc.file_hash.clone();
        store.commit(doc, chunks).unwrap();

        let removed = store.delete(&id).unwrap();
        assert_eq!(removed.map(|d| d.id), Some(id.clone()));
        assert_eq!(store.stats(), CorpusStats::default());
        assert!(store.find_by_file_hash(&file_hash).is_none());
        assert!(store.read().keyword().search("alpha", 10).is_empty());
        assert!(store.delete(&id).unwrap().is_none());
    }

    #[test]
    fn test_delete_detects_index_corruption() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "alpha beta gamma delta epsilon", true);
        let id = doc.id.clone();
        store.commit(doc, chunks).unwrap();

        store.write().vectors.remove(&id);

        let err = store.delete(&id).unwrap_err();
        assert!(matches!(err, RetrievalError::IndexCorruption { ref doc_id, .. } if doc_id == &id));
        assert!(store.contains(&id));
        assert!(store.read().keyword().chunk_ids_for(&id).is_some());
    }

    #[test]
    fn test_delete_detects_stray_keyword_chunk() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "alpha beta gamma", false);
        let id = doc.id.clone();
        store.commit(doc, chunks.clone()).unwrap();

        let mut extra = chunks;
        extra.push(Chunk {
            id: ChunkId::new(&id, 99),
            text: "stray".to_string(),
            hash: String::new(),
            embedding: None,
        });
        store.write().keyword.update(&id, &extra);

        assert!(matches!(store.delete(&id), Err(RetrievalError::IndexCorruption { .. })));
        assert!(store.contains(&id));
    }

    #[test]
    fn test_keyword_only_document_has_no_vectors() {
        let store = DocumentStore::new();
        let (doc, chunks) = prepared(&store, "a", "plain words only", false);
        let id = doc.id.clone();
        store.commit(doc, chunks).unwrap();
        let stats = store.stats();
        assert_eq!(stats.embedded_chunk_count, 0);
        assert_eq!(stats.keyword_only_documents, 1);
        assert!(store.delete(&id).unwrap().is_some());
    }

    #[test]
    fn test_list_orders_by_created_at_then_id() {
        let store = DocumentStore::new();
        let (mut late, lc) = prepared(&store, "late", "late text", false);
        late.created_at = 200;
        let (early, ec) = prepared(&store, "early", "early text", false);
        store.commit(late, lc).unwrap();
        store.commit(early, ec).unwrap();
        let listed: Vec<i64> = store.list().iter().map(|d| d.created_at).collect();
        assert_eq!(listed, vec![100, 200]);
    }

    #[test]
    fn test_restore_registers_hashes() {
        let source = DocumentStore::new();
        let (doc, chunks) = prepared(&source, "a", "restored body", true);
        let file_hash = doc.file_hash.clone();
        let id = doc.id.clone();

        let store = DocumentStore::new();
        store.restore(doc, chunks).unwrap();
        assert_eq!(store.find_by_file_hash(&file_hash), Some(id));
    }

    #[test]
    fn test_independent_stores() {
        let a = DocumentStore::new();
        let b = DocumentStore::new();
        let (doc, chunks) = prepared(&a, "a", "only in a", false);
        a.commit(doc, chunks).unwrap();
        assert_eq!(a.stats().document_count, 1);
        assert_eq!(b.stats().document_count, 0);
    }
}
