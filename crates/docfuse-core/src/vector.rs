//! Exact-scan vector index keyed by chunk id.
//!
//! Sized for thousands of chunks, so search is a linear cosine-distance
//! scan. Entries are kept in a `BTreeMap` ordered by [`ChunkId`], which
//! keeps every document's vectors contiguous and makes removal a range
//! operation.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::embedding::{cosine_distance, EmbeddingProvider};
use crate::error::{Result, RetrievalError};
use crate::models::{Chunk, ChunkId, ChunkMeta, DocId};

/// Default number of texts sent to the provider per request.
pub const DEFAULT_EMBED_BATCH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
    pub meta: ChunkMeta,
}

#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: BTreeMap<ChunkId, VectorEntry>,
    dims: Option<usize>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality shared by every stored vector, once one is stored.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, chunk_id: &ChunkId) -> Option<&VectorEntry> {
        self.entries.get(chunk_id)
    }

    /// Entries belonging to `doc_id`, in chunk order.
    pub fn entries_for<'a>(&'a self, doc_id: &DocId) -> impl Iterator<Item = &'a VectorEntry> + 'a {
        self.entries
            .range(ChunkId::new(doc_id, 0)..=ChunkId::new(doc_id, usize::MAX))
            .map(|(_, entry)| entry)
    }

    /// Check that `entries` could be upserted without changing anything.
    pub fn validate(&self, entries: &[VectorEntry]) -> Result<()> {
        let mut expected = self.dims;
        for entry in entries {
            if !is_finite(&entry.vector) {
                return Err(RetrievalError::NonFiniteEmbedding(entry.chunk_id.clone()));
            }
            let actual = entry.vector.len();
            match expected {
                Some(dims) if dims != actual => {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: dims,
                        actual,
                    })
                }
                _ => expected = Some(actual),
            }
        }
        Ok(())
    }

    /// Insert or replace entries for `doc_id`. All-or-nothing on dimension errors.
    pub fn upsert(&mut self, doc_id: &DocId, entries: Vec<VectorEntry>) -> Result<()> {
        self.validate(&entries)?;
        let count = entries.len();
        for entry in entries {
            self.dims.get_or_insert(entry.vector.len());
            self.entries.insert(entry.chunk_id.clone(), entry);
        }
        tracing::debug!(doc_id = %doc_id, vectors = count, "vector index updated");
        Ok(())
    }

    /// Remove every entry of `doc_id`; returns how many were removed.
    pub fn remove(&mut self, doc_id: &DocId) -> usize {
        let ids: Vec<ChunkId> = self.entries_for(doc_id).map(|e| e.chunk_id.clone()).collect();
        for id in &ids {
            self.entries.remove(id);
        }
        if self.entries.is_empty() {
            self.dims = None;
        }
        if !ids.is_empty() {
            tracing::debug!(doc_id = %doc_id, vectors = ids.len(), "vector entries removed");
        }
        ids.len()
    }

    /// Nearest `k` chunks by cosine distance, closest first, ties by chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(ChunkId, f32)> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }
        if let Some(dims) = self.dims {
            if dims != query.len() {
                tracing::warn!(
                    expected = dims,
                    actual = query.len(),
                    "query embedding dimension mismatch; skipping vector search"
                );
                return Vec::new();
            }
        }

        let mut ranked: Vec<(ChunkId, f32)> = self
            .entries
            .values()
            .map(|e| (e.chunk_id.clone(), cosine_distance(query, &e.vector)))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }
}

/// Embed `chunks` in batches, filling in each chunk's `embedding`.
///
/// Nothing is written unless every batch succeeds.
pub async fn embed_chunks(
    provider: &dyn EmbeddingProvider,
    chunks: &mut [Chunk],
    batch_size: usize,
) -> Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }
    if !provider.is_available() {
        return Err(RetrievalError::EmbeddingProviderUnavailable(format!(
            "provider '{}' is not available",
            provider.model_name()
        )));
    }

    let batch_size = batch_size.max(1);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = provider
            .embed(&texts)
            .await
            .map_err(|e| RetrievalError::EmbeddingProviderUnavailable(format!("{:#}", e)))?;
        if embedded.len() != texts.len() {
            return Err(RetrievalError::EmbeddingProviderUnavailable(format!(
                "provider returned {} vectors for {} texts",
                embedded.len(),
                texts.len()
            )));
        }
        vectors.extend(embedded);
    }

    if vectors.iter().any(|v| !is_finite(v)) {
        return Err(RetrievalError::EmbeddingProviderUnavailable(
            "provider returned non-finite vector components".to_string(),
        ));
    }

    let expected = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(RetrievalError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }

    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = Some(vector);
    }
    Ok(())
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Embed a search query. Any failure degrades to `None` with a warning.
pub async fn embed_query(provider: &dyn EmbeddingProvider, query: &str) -> Option<Vec<f32>> {
    if !provider.is_available() {
        tracing::debug!("embedding provider disabled; vector search skipped");
        return None;
    }
    match provider.embed_query(query).await {
        Ok(vector) if is_finite(&vector) => Some(vector),
        Ok(_) => {
            tracing::warn!("query embedding has non-finite components; vector search degraded");
            None
        }
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "query embedding failed; vector search degraded");
            None
        }
    }
}
