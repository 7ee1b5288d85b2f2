//! A retrieval engine bound to its SQLite database.
//!
//! Every CLI command opens a [`Workspace`]: connect, migrate, replay the
//! persisted corpus into a fresh in-memory store, then wire up the
//! configured embedding provider and the file extractor.

use std::sync::Arc;

use anyhow::Result;
use docfuse_core::models::{DocId, IngestOutcome, IngestStatus};
use docfuse_core::store::DocumentStore;
use docfuse_core::{IngestRequest, RetrievalEngine};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::extract::FileExtractor;
use crate::migrate;
use crate::sqlite_store;

pub struct Workspace {
    pub engine: RetrievalEngine,
    pub pool: SqlitePool,
}

impl Workspace {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;

        let store = Arc::new(DocumentStore::new());
        let loaded = sqlite_store::load_into(&pool, &store).await?;

        let provider = embedding::create_provider(&config.embedding)?;
        let engine = RetrievalEngine::new(
            store,
            provider,
            Arc::new(FileExtractor),
            config.engine_params()?,
        );
        tracing::debug!(documents = loaded, db = %config.db.path.display(), "workspace opened");

        Ok(Self { engine, pool })
    }

    /// Ingest one file's bytes and persist the document if it was admitted.
    pub async fn ingest(&self, raw: &[u8], filename: &str, source: Option<&str>) -> Result<IngestOutcome> {
        let outcome = self
            .engine
            .ingest(IngestRequest { raw, filename, source })
            .await?;

        if outcome.status == IngestStatus::New {
            if let Some(stored) = outcome.doc_id.as_ref().and_then(|id| self.engine.get(id)) {
                let model = self.engine.provider().model_name().to_string();
                if let Err(e) = sqlite_store::save_document(&self.pool, &stored, &model).await {
                    // an unsaved document must not stay searchable
                    self.engine.delete(&stored.document.id)?;
                    return Err(e);
                }
            }
        }
        Ok(outcome)
    }

    /// Delete from the engine first, then from disk. Returns whether the
    /// document existed.
    pub async fn delete(&self, doc_id: &DocId) -> Result<bool> {
        let outcome = self.engine.delete(doc_id)?;
        let on_disk = sqlite_store::delete_document(&self.pool, doc_id).await?;
        if outcome.found != on_disk {
            tracing::warn!(doc_id = %doc_id, in_memory = outcome.found, on_disk, "document store and database disagreed");
        }
        Ok(outcome.found || on_disk)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
