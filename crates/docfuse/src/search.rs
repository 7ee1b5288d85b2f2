//! `docfuse search`: run a query and print ranked, cited hits.
//!
//! Modes are `keyword`, `vector` (alias `semantic`) and `hybrid`. With the
//! embedding provider disabled or unreachable, vector candidates are
//! simply absent; hybrid degrades to keyword ranking and vector mode
//! returns nothing.

use anyhow::Result;
use docfuse_core::search::{SearchHit, SearchMode, SearchRequest};

use crate::config::Config;
use crate::workspace::Workspace;

pub struct SearchArgs<'a> {
    pub query: &'a str,
    pub mode: &'a str,
    pub limit: Option<usize>,
    pub explain: bool,
    pub json: bool,
}

/// Run a search against the persisted corpus.
pub async fn search_documents(
    config: &Config,
    query: &str,
    mode: SearchMode,
    limit: usize,
    explain: bool,
) -> Result<Vec<SearchHit>> {
    let workspace = Workspace::open(config).await?;
    let hits = workspace
        .engine
        .search(&SearchRequest {
            query,
            mode,
            limit,
            explain,
        })
        .await;
    workspace.close().await;
    Ok(hits)
}

/// CLI entry point; prints hits to stdout.
pub async fn run_search(config: &Config, args: SearchArgs<'_>) -> Result<()> {
    let mode: SearchMode = args.mode.parse()?;
    let limit = args.limit.unwrap_or(config.retrieval.final_limit);
    let hits = search_documents(config, args.query, mode, limit, args.explain).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    if args.explain {
        if let Some(ex) = hits.first().and_then(|h| h.explain.as_ref()) {
            println!(
                "Search: mode={}, weights: keyword={:.2} vector={:.2}, candidates: {} keyword + {} vector{}",
                mode,
                ex.keyword_weight,
                ex.vector_weight,
                ex.keyword_candidates,
                ex.vector_candidates,
                if ex.vector_degraded { " (vector search unavailable)" } else { "" }
            );
            println!();
        }
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} (chunk {})",
            i + 1,
            hit.score,
            hit.filename,
            hit.chunk_index
        );
        if let Some(ref ex) = hit.explain {
            println!(
                "    scoring: keyword={:.3}  vector={:.3}  → {}={:.3}",
                ex.keyword_score, ex.vector_score, mode, hit.score
            );
        }
        if let Some(ref source) = hit.source {
            println!("    source: {}", source);
        }
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        println!("    id: {}", hit.doc_id);
        println!();
    }

    Ok(())
}
