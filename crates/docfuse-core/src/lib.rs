//! # docfuse core
//!
//! Hybrid document retrieval: duplicate-safe admission, sliding-window
//! chunking, a BM25 keyword index, an exact cosine vector index, and rank
//! fusion with per-document and near-duplicate snippet deduplication.
//!
//! This crate holds no tokio, sqlx, filesystem or network code. Embedding
//! providers and text extractors are injected through the
//! [`EmbeddingProvider`](embedding::EmbeddingProvider) and
//! [`TextExtractor`](engine::TextExtractor) traits; the `docfuse` app
//! crate supplies concrete ones along with persistence and the CLI.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use docfuse_core::embedding::EmbeddingProvider;
//! use docfuse_core::engine::{EngineParams, IngestRequest, RetrievalEngine, TextExtractor};
//! use docfuse_core::models::IngestStatus;
//! use docfuse_core::search::{SearchMode, SearchRequest};
//! use docfuse_core::store::DocumentStore;
//!
//! struct Utf8;
//! impl TextExtractor for Utf8 {
//!     fn extract(&self, raw: &[u8], _declared_type: &str) -> anyhow::Result<String> {
//!         Ok(String::from_utf8_lossy(raw).into_owned())
//!     }
//! }
//!
//! struct NoEmbeddings;
//! #[async_trait]
//! impl EmbeddingProvider for NoEmbeddings {
//!     fn model_name(&self) -> &str { "none" }
//!     fn dims(&self) -> usize { 0 }
//!     fn is_available(&self) -> bool { false }
//!     async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
//!         anyhow::bail!("disabled")
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let engine = RetrievalEngine::new(
//!     Arc::new(DocumentStore::new()),
//!     Arc::new(NoEmbeddings),
//!     Arc::new(Utf8),
//!     EngineParams::default(),
//! );
//! let outcome = engine
//!     .ingest(IngestRequest { raw: b"Refunds within 30 days.", filename: "policy.txt", source: None })
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.status, IngestStatus::New);
//!
//! let hits = engine
//!     .search(&SearchRequest { query: "refunds", mode: SearchMode::Hybrid, limit: 5, explain: false })
//!     .await;
//! assert_eq!(hits.len(), 1);
//! # });
//! ```

pub mod chunk;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod guard;
pub mod keyword;
pub mod models;
pub mod search;
pub mod snippet;
pub mod store;
pub mod tokenize;
pub mod vector;

pub use engine::{EmbeddingFailurePolicy, EngineParams, IngestRequest, RetrievalEngine, TextExtractor};
pub use error::{Result, RetrievalError};
