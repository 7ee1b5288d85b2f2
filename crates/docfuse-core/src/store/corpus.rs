//! The state guarded by a [`DocumentStore`](super::DocumentStore) lock.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, RetrievalError};
use crate::guard::DuplicateGuard;
use crate::keyword::KeywordIndex;
use crate::models::{Chunk, ChunkId, ChunkMeta, CorpusStats, DocId, Document, StoredDocument};
use crate::vector::{VectorEntry, VectorIndex};

/// Canonical records plus both indexes and the admission registry.
///
/// Read access is handed out through the store's lock; every mutation
/// goes through [`insert`](Self::insert) or [`remove`](Self::remove) so the
/// four structures never drift apart.
#[derive(Debug, Default)]
pub struct Corpus {
    pub(crate) documents: HashMap<DocId, Document>,
    /// Chunk text; embeddings live only in `vectors`.
    pub(crate) chunks: HashMap<ChunkId, Chunk>,
    pub(crate) keyword: KeywordIndex,
    pub(crate) vectors: VectorIndex,
    pub(crate) guard: DuplicateGuard,
}

impl Corpus {
    pub fn document(&self, doc_id: &DocId) -> Option<&Document> {
        self.documents.get(doc_id)
    }

    pub fn chunk(&self, chunk_id: &ChunkId) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn keyword(&self) -> &KeywordIndex {
        &self.keyword
    }

    pub fn vectors(&self) -> &VectorIndex {
        &self.vectors
    }

    pub fn guard(&self) -> &DuplicateGuard {
        &self.guard
    }

    /// Validate, then add `document` to every structure.
    pub(crate) fn insert(&mut self, document: Document, chunks: Vec<Chunk>) -> Result<()> {
        if self.documents.contains_key(&document.id) {
            return Err(RetrievalError::DuplicateDocument(document.id));
        }
        if let Some(owner) = self.guard.conflict(&document) {
            return Err(RetrievalError::DuplicateDocument(owner.clone()));
        }

        let chunk_ids: Vec<&ChunkId> = chunks.iter().map(|c| &c.id).collect();
        if chunk_ids.len() != document.chunk_ids.len()
            || chunk_ids.iter().zip(&document.chunk_ids).any(|(a, b)| *a != b)
        {
            return Err(RetrievalError::IndexCorruption {
                doc_id: document.id,
                detail: "chunk ids do not match the document's chunk list".to_string(),
            });
        }

        let embedded = chunks.iter().filter(|c| c.embedding.is_some()).count();
        if !document.keyword_only && embedded != chunks.len() {
            return Err(RetrievalError::IndexCorruption {
                doc_id: document.id,
                detail: format!("{} of {} chunks have embeddings", embedded, chunks.len()),
            });
        }

        let mut entries = Vec::with_capacity(embedded);
        let mut stripped = Vec::with_capacity(chunks.len());
        for mut chunk in chunks {
            if let Some(vector) = chunk.embedding.take() {
                entries.push(VectorEntry {
                    chunk_id: chunk.id.clone(),
                    vector,
                    meta: ChunkMeta::for_chunk(&document, &chunk),
                });
            }
            stripped.push(chunk);
        }
        self.vectors.validate(&entries)?;

        self.keyword.update(&document.id, &stripped);
        self.vectors.upsert(&document.id, entries)?;
        for chunk in stripped {
            self.chunks.insert(chunk.id.clone(), chunk);
        }
        self.guard.register(&document);
        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    /// Check that the indexes agree with the document's chunk list.
    pub(crate) fn check_consistency(&self, document: &Document) -> Result<()> {
        let corrupt = |detail: String| RetrievalError::IndexCorruption {
            doc_id: document.id.clone(),
            detail,
        };

        let expected: HashSet<&ChunkId> = document.chunk_ids.iter().collect();

        if let Some(missing) = document.chunk_ids.iter().find(|id| !self.chunks.contains_key(*id)) {
            return Err(corrupt(format!("chunk {} missing from store", missing)));
        }

        let indexed: HashSet<&ChunkId> = self
            .keyword
            .chunk_ids_for(&document.id)
            .unwrap_or_default()
            .iter()
            .collect();
        if indexed != expected {
            return Err(corrupt(format!(
                "keyword index holds {} chunks, document lists {}",
                indexed.len(),
                expected.len()
            )));
        }

        let vector_ids: Vec<&ChunkId> = self
            .vectors
            .entries_for(&document.id)
            .map(|e| &e.chunk_id)
            .collect();
        if let Some(stray) = vector_ids.iter().find(|id| !expected.contains(*id)) {
            return Err(corrupt(format!("vector entry {} has no matching chunk", stray)));
        }
        if !document.keyword_only && vector_ids.len() != expected.len() {
            return Err(corrupt(format!(
                "vector index holds {} of {} chunks",
                vector_ids.len(),
                expected.len()
            )));
        }
        Ok(())
    }

    /// Remove a document from every structure after a consistency check.
    /// Nothing is touched if the check fails.
    pub(crate) fn remove(&mut self, doc_id: &DocId) -> Result<Option<Document>> {
        let Some(document) = self.documents.get(doc_id) else {
            return Ok(None);
        };
        self.check_consistency(document)?;

        let Some(document) = self.documents.remove(doc_id) else {
            return Ok(None);
        };
        self.keyword.remove(doc_id);
        self.vectors.remove(doc_id);
        for id in &document.chunk_ids {
            self.chunks.remove(id);
        }
        self.guard.forget(&document);
        Ok(Some(document))
    }

    /// Document with its chunks in order and embeddings filled back in.
    pub(crate) fn assemble(&self, doc_id: &DocId) -> Option<StoredDocument> {
        let document = self.documents.get(doc_id)?;
        let chunks = document
            .chunk_ids
            .iter()
            .filter_map(|id| {
                let mut chunk = self.chunks.get(id)?.clone();
                chunk.embedding = self.vectors.get(id).map(|e| e.vector.clone());
                Some(chunk)
            })
            .collect();
        Some(StoredDocument {
            document: document.clone(),
            chunks,
        })
    }

    pub(crate) fn stats(&self) -> CorpusStats {
        CorpusStats {
            document_count: self.documents.len(),
            chunk_count: self.chunks.len(),
            token_count: self.keyword.token_count(),
            embedded_chunk_count: self.vectors.len(),
            keyword_only_documents: self.documents.values().filter(|d| d.keyword_only).count(),
        }
    }
}
