//! In-memory inverted index with Okapi BM25 scoring.
//!
//! Postings map each token to the chunks containing it and the term
//! frequency there. Per-chunk token lists are kept so that removing a
//! document retracts exactly its own postings without rebuilding the
//! index.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::{Chunk, ChunkId, DocId};
use crate::tokenize::tokenize;

pub const BM25_K1: f64 = 1.2;
pub const BM25_B: f64 = 0.75;

#[derive(Debug, Default)]
pub struct KeywordIndex {
    postings: HashMap<String, HashMap<ChunkId, u32>>,
    /// Distinct terms per chunk, for incremental removal.
    chunk_terms: HashMap<ChunkId, Vec<String>>,
    /// Token count per chunk (document length in BM25 terms).
    chunk_lengths: HashMap<ChunkId, usize>,
    doc_chunks: HashMap<DocId, Vec<ChunkId>>,
    total_length: usize,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a document's chunks, replacing any postings it already had.
    pub fn update(&mut self, doc_id: &DocId, chunks: &[Chunk]) {
        self.remove(doc_id);

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let tokens = tokenize(&chunk.text);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }

            let mut terms = Vec::with_capacity(tf.len());
            for (term, count) in tf {
                self.postings
                    .entry(term.clone())
                    .or_default()
                    .insert(chunk.id.clone(), count);
                terms.push(term);
            }

            self.total_length += tokens.len();
            self.chunk_lengths.insert(chunk.id.clone(), tokens.len());
            self.chunk_terms.insert(chunk.id.clone(), terms);
            ids.push(chunk.id.clone());
        }

        tracing::debug!(doc_id = %doc_id, chunks = ids.len(), "keyword index updated");
        self.doc_chunks.insert(doc_id.clone(), ids);
    }

    /// Retract a document's postings. Returns false if it was not indexed.
    pub fn remove(&mut self, doc_id: &DocId) -> bool {
        let Some(ids) = self.doc_chunks.remove(doc_id) else {
            return false;
        };

        for id in &ids {
            for term in self.chunk_terms.remove(id).unwrap_or_default() {
                if let Some(list) = self.postings.get_mut(&term) {
                    list.remove(id);
                    if list.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
            if let Some(len) = self.chunk_lengths.remove(id) {
                self.total_length -= len;
            }
        }

        tracing::debug!(doc_id = %doc_id, chunks = ids.len(), "keyword postings removed");
        true
    }

    /// Top `k` chunks by BM25 score. Only chunks sharing at least one
    /// token with the query appear.
    pub fn search(&self, query: &str, k: usize) -> Vec<(ChunkId, f64)> {
        if k == 0 || self.chunk_lengths.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let n = self.chunk_lengths.len() as f64;
        let avg_len = (self.total_length as f64 / n).max(1.0);

        let mut scores: HashMap<&ChunkId, f64> = HashMap::new();
        for term in &terms {
            let Some(list) = self.postings.get(term) else {
                continue;
            };
            let df = list.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();

            for (chunk_id, &tf) in list {
                let tf = tf as f64;
                let len = self.chunk_lengths.get(chunk_id).copied().unwrap_or(0) as f64;
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg_len);
                *scores.entry(chunk_id).or_insert(0.0) += idf * tf * (BM25_K1 + 1.0) / denom;
            }
        }

        let mut ranked: Vec<(ChunkId, f64)> = scores
            .into_iter()
            .map(|(id, score)| (id.clone(), score))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(k);
        ranked
    }

    /// Number of distinct terms.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_lengths.len()
    }

    pub fn chunk_ids_for(&self, doc_id: &DocId) -> Option<&[ChunkId]> {
        self.doc_chunks.get(doc_id).map(Vec::as_slice)
    }

    pub fn contains_document(&self, doc_id: &DocId) -> bool {
        self.doc_chunks.contains_key(doc_id)
    }
}
