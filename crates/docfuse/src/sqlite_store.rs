//! SQLite persistence for the in-memory [`DocumentStore`].
//!
//! The store and its indexes live in memory. Every committed document is
//! written here in a single transaction, and on startup the whole corpus
//! is replayed through [`DocumentStore::restore`], which rebuilds the
//! keyword and vector indexes with the same validation as a fresh commit.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use docfuse_core::embedding::{blob_to_vec, vec_to_blob};
use docfuse_core::models::{Chunk, ChunkId, DocId, Document, StoredDocument};
use docfuse_core::store::DocumentStore;

/// Replay every persisted document into `store`. Returns the number loaded.
pub async fn load_into(pool: &SqlitePool, store: &DocumentStore) -> Result<usize> {
    let doc_rows = sqlx::query(
        "SELECT id, filename, source, file_hash, content_hash, created_at, keyword_only
         FROM documents ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    let chunk_rows = sqlx::query(
        "SELECT c.doc_id, c.chunk_index, c.text, c.hash, v.embedding
         FROM chunks c
         LEFT JOIN chunk_vectors v ON v.doc_id = c.doc_id AND v.chunk_index = c.chunk_index
         ORDER BY c.doc_id, c.chunk_index",
    )
    .fetch_all(pool)
    .await?;

    let mut chunks_by_doc: HashMap<String, Vec<Chunk>> = HashMap::new();
    for row in &chunk_rows {
        let doc_id: String = row.get("doc_id");
        let index: i64 = row.get("chunk_index");
        let embedding: Option<Vec<u8>> = row.get("embedding");
        let chunk = Chunk {
            id: ChunkId::new(&DocId::from(doc_id.as_str()), index as usize),
            text: row.get("text"),
            hash: row.get("hash"),
            embedding: embedding.map(|blob| blob_to_vec(&blob)),
        };
        chunks_by_doc.entry(doc_id).or_default().push(chunk);
    }

    let mut loaded = 0;
    for row in &doc_rows {
        let id: String = row.get("id");
        let chunks = chunks_by_doc.remove(&id).unwrap_or_default();
        let keyword_only: i64 = row.get("keyword_only");
        let document = Document {
            id: DocId::from(id.as_str()),
            filename: row.get("filename"),
            source: row.get("source"),
            file_hash: row.get("file_hash"),
            content_hash: row.get("content_hash"),
            created_at: row.get("created_at"),
            chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
            keyword_only: keyword_only != 0,
        };
        store
            .restore(document, chunks)
            .with_context(|| format!("Failed to restore document {}", id))?;
        loaded += 1;
    }

    if !chunks_by_doc.is_empty() {
        tracing::warn!(orphans = chunks_by_doc.len(), "chunks without a document were ignored");
    }
    tracing::debug!(documents = loaded, "corpus loaded from database");
    Ok(loaded)
}

/// Persist a committed document, its chunks and any vectors.
pub async fn save_document(pool: &SqlitePool, stored: &StoredDocument, model: &str) -> Result<()> {
    let doc = &stored.document;
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO documents (id, filename, source, file_hash, content_hash, created_at, keyword_only)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(doc.id.as_str())
    .bind(&doc.filename)
    .bind(&doc.source)
    .bind(&doc.file_hash)
    .bind(&doc.content_hash)
    .bind(doc.created_at)
    .bind(doc.keyword_only as i64)
    .execute(&mut *tx)
    .await?;

    for chunk in &stored.chunks {
        let index = chunk.index() as i64;
        sqlx::query("INSERT INTO chunks (doc_id, chunk_index, text, hash) VALUES (?, ?, ?, ?)")
            .bind(doc.id.as_str())
            .bind(index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

        if let Some(vector) = &chunk.embedding {
            sqlx::query(
                "INSERT INTO chunk_vectors (doc_id, chunk_index, model, dims, embedding)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(doc.id.as_str())
            .bind(index)
            .bind(model)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Delete a document and, through cascades, its chunks and vectors.
pub async fn delete_document(pool: &SqlitePool, doc_id: &DocId) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunk_vectors WHERE doc_id = ?")
        .bind(doc_id.as_str())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE doc_id = ?")
        .bind(doc_id.as_str())
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(doc_id.as_str())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Size of the database file in bytes, via SQLite's page counters.
pub async fn database_size(pool: &SqlitePool) -> Result<i64> {
    let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
        .fetch_one(pool)
        .await?;
    let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
        .fetch_one(pool)
        .await?;
    Ok(page_count * page_size)
}
