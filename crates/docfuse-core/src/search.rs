//! Query execution over a [`Corpus`] in keyword, vector, or hybrid mode.
//!
//! Embedding the query is the caller's job and happens before the corpus
//! read lock is taken; [`rank`] itself is synchronous.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Fetch up to `candidate_k_keyword` BM25 candidates.
//! 2. Fetch up to `candidate_k_vector` nearest chunks by cosine distance.
//! 3. Normalize both sides to `[0, 1]` and blend with
//!    `score = (1 - α) × keyword + α × vector`.
//! 4. If one side came back empty, the other side gets the full weight.
//! 5. Sort by score (desc), chunk id (asc).
//! 6. Keep the best chunk per document, drop near-duplicate snippets,
//!    stop at `limit`.
//!
//! Keyword mode reports raw BM25 scores and vector mode reports cosine
//! similarity; the same deduplication applies in every mode.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::RetrievalError;
use crate::fusion::{
    FusedCandidate, FusionWeights, HybridRanker, DEFAULT_DEDUP_SIMILARITY, DEFAULT_HYBRID_ALPHA,
};
use crate::models::{ChunkId, DocId};
use crate::snippet::{extract_snippet, DEFAULT_SNIPPET_WIDTH};
use crate::store::Corpus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Vector,
    #[default]
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Vector => "vector",
            SearchMode::Hybrid => "hybrid",
        }
    }

    pub fn uses_keywords(&self) -> bool {
        matches!(self, SearchMode::Keyword | SearchMode::Hybrid)
    }

    pub fn uses_vectors(&self) -> bool {
        matches!(self, SearchMode::Vector | SearchMode::Hybrid)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "vector" | "semantic" => Ok(SearchMode::Vector),
            "hybrid" => Ok(SearchMode::Hybrid),
            _ => Err(RetrievalError::UnknownSearchMode(s.to_string())),
        }
    }
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Vector weight: `hybrid = (1-α)*keyword + α*vector`.
    pub hybrid_alpha: f64,
    pub candidate_k_keyword: usize,
    pub candidate_k_vector: usize,
    /// Snippet length in characters.
    pub snippet_width: usize,
    /// Jaccard similarity at or above which a snippet counts as a duplicate.
    pub dedup_similarity: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            hybrid_alpha: DEFAULT_HYBRID_ALPHA,
            candidate_k_keyword: 80,
            candidate_k_vector: 80,
            snippet_width: DEFAULT_SNIPPET_WIDTH,
            dedup_similarity: DEFAULT_DEDUP_SIMILARITY,
        }
    }
}

/// Bundles the per-call inputs of a search.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub mode: SearchMode,
    /// Maximum results to return.
    pub limit: usize,
    /// If true, populate [`ScoreExplanation`] on each hit.
    pub explain: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: ChunkId,
    pub doc_id: DocId,
    pub filename: String,
    pub chunk_index: usize,
    pub source: Option<String>,
    pub snippet: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreExplanation>,
}

/// Scoring breakdown for a hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreExplanation {
    /// Keyword component (normalized in hybrid mode, raw BM25 in keyword mode).
    pub keyword_score: f64,
    /// Vector component (normalized in hybrid mode, cosine similarity in vector mode).
    pub vector_score: f64,
    pub keyword_weight: f64,
    pub vector_weight: f64,
    pub keyword_candidates: usize,
    pub vector_candidates: usize,
    /// The mode wanted vectors but no query embedding was available.
    pub vector_degraded: bool,
}

/// Rank the corpus for `req`.
///
/// `query_vec` is the query embedding, or `None` when the provider was
/// unavailable; vector candidates are then simply absent.
pub fn rank(
    corpus: &Corpus,
    req: &SearchRequest<'_>,
    query_vec: Option<&[f32]>,
    params: &SearchParams,
) -> Vec<SearchHit> {
    if req.query.trim().is_empty() || req.limit == 0 {
        return Vec::new();
    }

    let keyword_candidates = if req.mode.uses_keywords() {
        corpus
            .keyword()
            .search(req.query, params.candidate_k_keyword.max(req.limit))
    } else {
        Vec::new()
    };

    let vector_candidates = match (req.mode.uses_vectors(), query_vec) {
        (true, Some(qv)) => corpus
            .vectors()
            .search(qv, params.candidate_k_vector.max(req.limit)),
        _ => Vec::new(),
    };
    let vector_degraded = req.mode.uses_vectors() && query_vec.is_none();

    let ranker = HybridRanker::new(
        FusionWeights::from_alpha(params.hybrid_alpha),
        params.dedup_similarity,
    );

    let (ranked, weights): (Vec<FusedCandidate>, FusionWeights) = match req.mode {
        SearchMode::Keyword => (
            HybridRanker::from_keyword(&keyword_candidates),
            FusionWeights::keyword_only(),
        ),
        SearchMode::Vector => (
            HybridRanker::from_vector(&vector_candidates),
            FusionWeights::vector_only(),
        ),
        SearchMode::Hybrid => (
            ranker.fuse(&keyword_candidates, &vector_candidates),
            ranker.effective_weights(keyword_candidates.len(), vector_candidates.len()),
        ),
    };

    let selected = ranker.select(ranked, req.limit, |chunk_id| {
        corpus.document(chunk_id.doc_id())?;
        let chunk = corpus.chunk(chunk_id)?;
        Some(extract_snippet(&chunk.text, req.query, params.snippet_width))
    });

    selected
        .into_iter()
        .filter_map(|(candidate, snippet)| {
            let document = corpus.document(candidate.chunk_id.doc_id())?;
            let explain = req.explain.then(|| ScoreExplanation {
                keyword_score: candidate.keyword_score,
                vector_score: candidate.vector_score,
                keyword_weight: weights.keyword,
                vector_weight: weights.vector,
                keyword_candidates: keyword_candidates.len(),
                vector_candidates: vector_candidates.len(),
                vector_degraded,
            });
            Some(SearchHit {
                doc_id: document.id.clone(),
                filename: document.filename.clone(),
                chunk_index: candidate.chunk_id.index(),
                source: document.source.clone(),
                chunk_id: candidate.chunk_id,
                snippet,
                score: candidate.score,
                explain,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Keyword);
        assert_eq!("Semantic".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Vector);
        assert_eq!(" hybrid ".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!(matches!(
            "fuzzy".parse::<SearchMode>(),
            Err(RetrievalError::UnknownSearchMode(m)) if m == "fuzzy"
        ));
    }

    #[test]
    fn test_mode_components() {
        assert!(SearchMode::Keyword.uses_keywords());
        assert!(!SearchMode::Keyword.uses_vectors());
        assert!(SearchMode::Hybrid.uses_keywords() && SearchMode::Hybrid.uses_vectors());
        assert_eq!(SearchMode::default(), SearchMode::Hybrid);
        assert_eq!(SearchMode::Vector.to_string(), "vector");
    }

    #[test]
    fn test_default_params() {
        let p = SearchParams::default();
        assert_eq!(p.snippet_width, 280);
        assert!((p.hybrid_alpha - 0.6).abs() < 1e-12);
        assert!((p.dedup_similarity - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_empty_query_or_zero_limit() {
        let corpus = Corpus::default();
        let params = SearchParams::default();
        let req = SearchRequest {
            query: "   ",
            mode: SearchMode::Keyword,
            limit: 5,
            explain: false,
        };
        assert!(rank(&corpus, &req, None, &params).is_empty());
        let req = SearchRequest {
            query: "x",
            mode: SearchMode::Keyword,
            limit: 0,
            explain: false,
        };
        assert!(rank(&corpus, &req, None, &params).is_empty());
    }
}
