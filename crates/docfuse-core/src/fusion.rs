//! Rank fusion of keyword and vector candidates.
//!
//! Keyword scores and vector distances live on different scales, so each
//! side is min-max normalized to `[0, 1]` before blending:
//!
//! ```text
//! final = wk * norm(bm25) + wv * (1 - norm(distance))
//! ```
//!
//! A chunk found by only one side gets 0 for the other. When one side
//! produced no candidates at all, the other side carries the full weight.
//! After ranking, [`HybridRanker::select`] keeps the first chunk of each
//! document and drops near-duplicate snippets.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{ChunkId, DocId};
use crate::tokenize::{jaccard, token_set};

pub const DEFAULT_HYBRID_ALPHA: f64 = 0.6;
pub const DEFAULT_DEDUP_SIMILARITY: f64 = 0.9;

/// Blend weights; always sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionWeights {
    pub keyword: f64,
    pub vector: f64,
}

impl FusionWeights {
    /// `alpha` is the vector weight, clamped to `[0, 1]`.
    pub fn from_alpha(alpha: f64) -> Self {
        let vector = alpha.clamp(0.0, 1.0);
        Self {
            keyword: 1.0 - vector,
            vector,
        }
    }

    pub fn keyword_only() -> Self {
        Self {
            keyword: 1.0,
            vector: 0.0,
        }
    }

    pub fn vector_only() -> Self {
        Self {
            keyword: 0.0,
            vector: 1.0,
        }
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::from_alpha(DEFAULT_HYBRID_ALPHA)
    }
}

/// Min-max normalize to `[0, 1]`. A zero range (including empty and
/// single-element input) maps everything to 0.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if range <= f64::EPSILON {
        return vec![0.0; scores.len()];
    }

    scores.iter().map(|&s| (s - min) / range).collect()
}

/// Turn distances into `[0, 1]` similarities: `1 - minmax(distance)`.
/// A zero range maps everything to 0.
pub fn normalize_distances(distances: &[f32]) -> Vec<f64> {
    let as_f64: Vec<f64> = distances.iter().map(|&d| d as f64).collect();
    let min = as_f64.iter().copied().fold(f64::INFINITY, f64::min);
    let max = as_f64.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if as_f64.is_empty() || max - min <= f64::EPSILON {
        return vec![0.0; as_f64.len()];
    }
    normalize_scores(&as_f64).into_iter().map(|n| 1.0 - n).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedCandidate {
    pub chunk_id: ChunkId,
    pub score: f64,
    pub keyword_score: f64,
    pub vector_score: f64,
}

fn rank_order(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

#[derive(Debug, Clone, Copy)]
pub struct HybridRanker {
    pub weights: FusionWeights,
    pub similarity_threshold: f64,
}

impl Default for HybridRanker {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            similarity_threshold: DEFAULT_DEDUP_SIMILARITY,
        }
    }
}

impl HybridRanker {
    pub fn new(weights: FusionWeights, similarity_threshold: f64) -> Self {
        Self {
            weights,
            similarity_threshold,
        }
    }

    /// Weights actually applied for the given candidate counts.
    pub fn effective_weights(&self, keyword_hits: usize, vector_hits: usize) -> FusionWeights {
        match (keyword_hits, vector_hits) {
            (_, 0) => FusionWeights::keyword_only(),
            (0, _) => FusionWeights::vector_only(),
            _ => self.weights,
        }
    }

    /// Blend both candidate lists into one ranking.
    pub fn fuse(
        &self,
        keyword: &[(ChunkId, f64)],
        vector: &[(ChunkId, f32)],
    ) -> Vec<FusedCandidate> {
        let weights = self.effective_weights(keyword.len(), vector.len());

        let kw_raw: Vec<f64> = keyword.iter().map(|(_, s)| *s).collect();
        let kw_norm = normalize_scores(&kw_raw);
        let vec_raw: Vec<f32> = vector.iter().map(|(_, d)| *d).collect();
        let vec_norm = normalize_distances(&vec_raw);

        let mut merged: HashMap<&ChunkId, (f64, f64)> = HashMap::new();
        for ((id, _), norm) in keyword.iter().zip(kw_norm) {
            merged.entry(id).or_insert((0.0, 0.0)).0 = norm;
        }
        for ((id, _), norm) in vector.iter().zip(vec_norm) {
            merged.entry(id).or_insert((0.0, 0.0)).1 = norm;
        }

        let mut fused: Vec<FusedCandidate> = merged
            .into_iter()
            .map(|(id, (kw, vec))| FusedCandidate {
                chunk_id: id.clone(),
                score: (weights.keyword * kw + weights.vector * vec).min(1.0),
                keyword_score: kw,
                vector_score: vec,
            })
            .collect();
        fused.sort_by(rank_order);
        fused
    }

    /// Candidates from keyword search alone, scored by raw BM25.
    pub fn from_keyword(keyword: &[(ChunkId, f64)]) -> Vec<FusedCandidate> {
        let mut ranked: Vec<FusedCandidate> = keyword
            .iter()
            .map(|(id, score)| FusedCandidate {
                chunk_id: id.clone(),
                score: *score,
                keyword_score: *score,
                vector_score: 0.0,
            })
            .collect();
        ranked.sort_by(rank_order);
        ranked
    }

    /// Candidates from vector search alone, scored by cosine similarity.
    pub fn from_vector(vector: &[(ChunkId, f32)]) -> Vec<FusedCandidate> {
        let mut ranked: Vec<FusedCandidate> = vector
            .iter()
            .map(|(id, distance)| {
                let similarity = 1.0 - *distance as f64;
                FusedCandidate {
                    chunk_id: id.clone(),
                    score: similarity,
                    keyword_score: 0.0,
                    vector_score: similarity,
                }
            })
            .collect();
        ranked.sort_by(rank_order);
        ranked
    }

    /// Walk `ranked` in order and keep up to `k` results, skipping a chunk
    /// whose document is already represented or whose snippet is too
    /// similar to a kept one. `snippet_for` is only called for candidates
    /// that survive the document check; returning `None` skips the chunk.
    pub fn select<I, F>(&self, ranked: I, k: usize, mut snippet_for: F) -> Vec<(FusedCandidate, String)>
    where
        I: IntoIterator<Item = FusedCandidate>,
        F: FnMut(&ChunkId) -> Option<String>,
    {
        let mut kept = Vec::new();
        if k == 0 {
            return kept;
        }

        let mut seen_docs: HashSet<DocId> = HashSet::new();
        let mut kept_sets: Vec<HashSet<String>> = Vec::new();

        for candidate in ranked {
            if seen_docs.contains(candidate.chunk_id.doc_id()) {
                continue;
            }
            let Some(snippet) = snippet_for(&candidate.chunk_id) else {
                continue;
            };

            let words = token_set(&snippet);
            if kept_sets
                .iter()
                .any(|prev| jaccard(prev, &words) >= self.similarity_threshold)
            {
                tracing::debug!(chunk_id = %candidate.chunk_id, "dropped near-duplicate snippet");
                continue;
            }

            seen_docs.insert(candidate.chunk_id.doc_id().clone());
            kept_sets.push(words);
            kept.push((candidate, snippet));
            if kept.len() >= k {
                break;
            }
        }
        kept
    }
}
