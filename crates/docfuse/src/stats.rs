//! `docfuse stats`: corpus counters and database size.

use anyhow::Result;
use docfuse_core::models::format_ts_iso;
use serde::Serialize;

use crate::config::Config;
use crate::sqlite_store;
use crate::workspace::Workspace;

#[derive(Debug, Serialize)]
struct StatsReport {
    #[serde(flatten)]
    corpus: docfuse_core::models::CorpusStats,
    embedding_model: String,
    database_bytes: i64,
    last_ingested_at: Option<i64>,
}

pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let workspace = Workspace::open(config).await?;
    let corpus = workspace.engine.stats();
    let last_ingested_at = workspace.engine.list().last().map(|d| d.created_at);
    let database_bytes = sqlite_store::database_size(&workspace.pool).await?;
    let embedding_model = workspace.engine.provider().model_name().to_string();
    workspace.close().await;

    let report = StatsReport {
        corpus,
        embedding_model,
        database_bytes,
        last_ingested_at,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let c = &report.corpus;
    println!("docfuse stats");
    println!("=============");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(report.database_bytes.max(0) as u64));
    println!();
    println!("  Documents:   {}", c.document_count);
    println!("  Chunks:      {}", c.chunk_count);
    println!("  Terms:       {}", c.token_count);
    println!(
        "  Embedded:    {} / {} ({}%)  model: {}",
        c.embedded_chunk_count,
        c.chunk_count,
        if c.chunk_count > 0 {
            (c.embedded_chunk_count * 100) / c.chunk_count
        } else {
            0
        },
        report.embedding_model
    );
    if c.keyword_only_documents > 0 {
        println!("  Keyword only: {} documents", c.keyword_only_documents);
    }
    let last = match report.last_ingested_at {
        Some(ts) => format_ts_relative(ts, chrono::Utc::now().timestamp()),
        None => "never".to_string(),
    };
    println!("  Last ingest: {}", last);
    println!();

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// "3 hours ago" style, falling back to ISO 8601 past 30 days.
fn format_ts_relative(ts: i64, now: i64) -> String {
    let delta = now - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}
