//! `docfuse get` and `docfuse list`.

use anyhow::{bail, Result};
use docfuse_core::models::{format_ts_iso, DocId, Document, StoredDocument};

use crate::config::Config;
use crate::workspace::Workspace;

pub async fn get_document(config: &Config, id: &str) -> Result<StoredDocument> {
    let workspace = Workspace::open(config).await?;
    let result = workspace.engine.get(&DocId::from(id));
    workspace.close().await;

    match result {
        Some(doc) => Ok(doc),
        None => bail!("document not found: {}", id),
    }
}

pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let mut stored = get_document(config, id).await?;
    if json {
        for chunk in &mut stored.chunks {
            chunk.embedding = None;
        }
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    let doc = &stored.document;
    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("filename:     {}", doc.filename);
    if let Some(ref source) = doc.source {
        println!("source:       {}", source);
    }
    println!("created_at:   {}", format_ts_iso(doc.created_at));
    println!("file_hash:    {}", doc.file_hash);
    println!("content_hash: {}", doc.content_hash);
    println!("keyword_only: {}", doc.keyword_only);
    println!();

    println!("--- Chunks ({}) ---", stored.chunks.len());
    for chunk in &stored.chunks {
        println!("[chunk {}]", chunk.index());
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

pub async fn list_documents(config: &Config) -> Result<Vec<Document>> {
    let workspace = Workspace::open(config).await?;
    let docs = workspace.engine.list();
    workspace.close().await;
    Ok(docs)
}

pub async fn run_list(config: &Config, json: bool) -> Result<()> {
    let docs = list_documents(config).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!("{:<36}  {:>6}  {:<20}  FILENAME", "ID", "CHUNKS", "CREATED");
    for doc in &docs {
        println!(
            "{:<36}  {:>6}  {:<20}  {}{}",
            doc.id.as_str(),
            doc.chunk_ids.len(),
            format_ts_iso(doc.created_at),
            doc.filename,
            if doc.keyword_only { " (keyword only)" } else { "" }
        );
    }
    Ok(())
}
