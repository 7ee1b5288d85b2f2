//! `docfuse ingest`: collect files and feed them through the engine.
//!
//! Paths may be files or directories. Directories are walked and filtered
//! by `ingest.include_globs` / `ingest.exclude_globs`, matched against the
//! path relative to the directory. Explicitly named files skip the glob
//! filter but must still have a supported extension. Files larger than
//! `ingest.max_file_bytes` are skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use docfuse_core::engine::declared_type;
use docfuse_core::models::IngestStatus;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::{Config, IngestConfig};
use crate::extract::is_supported;
use crate::workspace::Workspace;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Expand `paths` into a sorted, de-duplicated list of candidate files.
pub fn collect_files(paths: &[PathBuf], ingest: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&ingest.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(ingest.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            let kind = declared_type(&root.to_string_lossy());
            if is_supported(&kind) {
                files.push(root.clone());
            } else {
                tracing::warn!(path = %root.display(), "unsupported file type skipped");
            }
            continue;
        }
        if !root.exists() {
            bail!("Path does not exist: {}", root.display());
        }

        for entry in WalkDir::new(root).follow_links(ingest.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy();

            if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn is_oversized(path: &Path, max_bytes: u64) -> Result<bool> {
    Ok(std::fs::metadata(path)?.len() > max_bytes)
}

#[derive(Debug, Default)]
struct IngestSummary {
    statuses: BTreeMap<&'static str, usize>,
    chunks_written: usize,
    keyword_only: usize,
    failed: usize,
    too_large: usize,
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf], dry_run: bool) -> Result<()> {
    if paths.is_empty() {
        bail!("No paths given. Usage: docfuse ingest <PATH>...");
    }
    let files = collect_files(paths, &config.ingest)?;

    if dry_run {
        let mut too_large = 0;
        println!("ingest (dry-run)");
        for file in &files {
            if is_oversized(file, config.ingest.max_file_bytes)? {
                too_large += 1;
                println!("  skip (too large) {}", file.display());
            } else {
                println!("  would ingest {}", file.display());
            }
        }
        println!("  files found: {}", files.len());
        println!("  skipped (too large): {}", too_large);
        return Ok(());
    }

    let workspace = Workspace::open(config).await?;
    let mut summary = IngestSummary::default();

    for file in &files {
        if is_oversized(file, config.ingest.max_file_bytes)? {
            tracing::warn!(path = %file.display(), max_bytes = config.ingest.max_file_bytes, "file too large; skipped");
            summary.too_large += 1;
            continue;
        }

        let raw = tokio::fs::read(file).await?;
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        let source = file.display().to_string();

        match workspace.ingest(&raw, &filename, Some(&source)).await {
            Ok(outcome) => {
                *summary.statuses.entry(outcome.status.as_str()).or_default() += 1;
                if outcome.status == IngestStatus::New {
                    summary.chunks_written += outcome.chunk_count;
                    if outcome.keyword_only {
                        summary.keyword_only += 1;
                    }
                }
                match &outcome.doc_id {
                    Some(id) => println!("  {:<20} {}  (id: {})", outcome.status.as_str(), file.display(), id),
                    None => println!("  {:<20} {}", outcome.status.as_str(), file.display()),
                }
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %format!("{:#}", e), "ingest failed");
                summary.failed += 1;
                println!("  {:<20} {}  ({:#})", "failed", file.display(), e);
            }
        }
    }

    workspace.close().await;

    println!("ingest");
    println!("  files scanned: {}", files.len());
    for status in [
        IngestStatus::New,
        IngestStatus::DuplicateFile,
        IngestStatus::DuplicateContent,
        IngestStatus::EmptyContent,
        IngestStatus::ProviderUnavailable,
    ] {
        let count = summary.statuses.get(status.as_str()).copied().unwrap_or(0);
        println!("  {}: {}", status, count);
    }
    println!("  failed: {}", summary.failed);
    println!("  skipped (too large): {}", summary.too_large);
    println!("  chunks written: {}", summary.chunks_written);
    if summary.keyword_only > 0 || !config.embedding.is_enabled() {
        println!("  keyword only: {}", summary.keyword_only);
    }
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str, body: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_collect_files_applies_globs() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt", b"a");
        touch(dir.path(), "nested/b.md", b"b");
        touch(dir.path(), "nested/c.bin", b"c");
        touch(dir.path(), "drafts/d.txt", b"d");
        touch(dir.path(), ".git/e.txt", b"e");

        let ingest = IngestConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..IngestConfig::default()
        };
        let files = collect_files(&[dir.path().to_path_buf()], &ingest).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.txt", "nested/b.md"]);
    }

    #[test]
    fn test_collect_files_explicit_file_and_dedup() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.txt", b"a");
        touch(dir.path(), "b.exe", b"b");
        let a = dir.path().join("a.txt");
        let files = collect_files(
            &[a.clone(), a.clone(), dir.path().join("b.exe")],
            &IngestConfig::default(),
        )
        .unwrap();
        assert_eq!(files, vec![a]);
    }

    #[test]
    fn test_collect_files_missing_path() {
        let err = collect_files(&[PathBuf::from("/no/such/dir")], &IngestConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
