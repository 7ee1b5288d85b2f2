//! # docfuse
//!
//! **Local hybrid (keyword + semantic) retrieval over office documents.**
//!
//! The retrieval engine itself lives in `docfuse-core`. This crate adds
//! everything that touches the outside world: TOML configuration, SQLite
//! persistence, embedding providers, file text extraction, directory
//! ingestion and the `docfuse` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │  Files     │──▶│  RetrievalEngine      │──▶│  SQLite  │
//! │ PDF/DOCX/… │   │ guard·chunk·BM25·vec  │   │ (sqlx)   │
//! └────────────┘   └──────────┬───────────┘   └──────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ CLI (docfuse)│
//!                      └──────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. [`ingest`] walks the given paths and hands each file's bytes to the
//!    engine through a [`workspace::Workspace`].
//! 2. [`extract`] turns bytes into text; the engine rejects duplicate
//!    files and duplicate content, chunks, and embeds through
//!    [`embedding`].
//! 3. Admitted documents are written to SQLite by [`sqlite_store`] and
//!    replayed into memory on the next run.
//! 4. [`search`] blends BM25 and cosine similarity, keeps the best chunk
//!    per document and drops near-duplicate snippets.
//!
//! ## Quick Start
//!
//! ```bash
//! docfuse init
//! docfuse ingest ./policies
//! docfuse search "refund window" --mode hybrid --explain
//! ```

pub mod config;
pub mod db;
pub mod delete;
pub mod embedding;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;
pub mod workspace;
