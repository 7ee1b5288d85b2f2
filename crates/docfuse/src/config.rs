//! Configuration parsing and validation.
//!
//! The TOML file has five sections. Only `[db]` is required; every other
//! section and field falls back to a default.
//!
//! ```toml
//! [db]
//! path = "./data/docfuse.sqlite"
//!
//! [chunking]
//! target_size = 1000
//! overlap = 200
//! unit = "chars"            # or "words"
//!
//! [retrieval]
//! hybrid_alpha = 0.6        # vector weight
//! final_limit = 5
//!
//! [embedding]
//! provider = "disabled"     # disabled | openai | ollama | local
//! on_failure = "keyword_only"
//!
//! [ingest]
//! include_globs = ["**/*.pdf", "**/*.txt"]
//! ```

use anyhow::{bail, Context, Result};
use docfuse_core::chunk::{ChunkParams, ChunkUnit, DEFAULT_OVERLAP, DEFAULT_TARGET_SIZE};
use docfuse_core::engine::{EmbeddingFailurePolicy, EngineParams};
use docfuse_core::search::SearchParams;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub unit: ChunkUnit,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            overlap: DEFAULT_OVERLAP,
            unit: ChunkUnit::default(),
        }
    }
}

fn default_target_size() -> usize {
    DEFAULT_TARGET_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k_keyword: usize,
    #[serde(default = "default_candidate_k")]
    pub candidate_k_vector: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_snippet_width")]
    pub snippet_width: usize,
    #[serde(default = "default_dedup_similarity")]
    pub dedup_similarity: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_k_keyword: default_candidate_k(),
            candidate_k_vector: default_candidate_k(),
            final_limit: default_final_limit(),
            snippet_width: default_snippet_width(),
            dedup_similarity: default_dedup_similarity(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.6
}
fn default_candidate_k() -> usize {
    80
}
fn default_final_limit() -> usize {
    5
}
fn default_snippet_width() -> usize {
    280
}
fn default_dedup_similarity() -> f64 {
    0.9
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout; the whole call including retries is bounded too.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Deadline for embedding a search query. Queries are never retried.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub on_failure: EmbeddingFailurePolicy,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
            url: None,
            on_failure: EmbeddingFailurePolicy::default(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_query_timeout_secs() -> u64 {
    5
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.pdf", "**/*.docx", "**/*.pptx", "**/*.xlsx", "**/*.txt", "**/*.md",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

impl Config {
    /// Core engine parameters derived from this config.
    pub fn engine_params(&self) -> Result<EngineParams> {
        let chunking = ChunkParams::new(
            self.chunking.target_size,
            self.chunking.overlap,
            self.chunking.unit,
        )?;
        let search = SearchParams {
            hybrid_alpha: self.retrieval.hybrid_alpha,
            candidate_k_keyword: self.retrieval.candidate_k_keyword,
            candidate_k_vector: self.retrieval.candidate_k_vector,
            snippet_width: self.retrieval.snippet_width,
            dedup_similarity: self.retrieval.dedup_similarity,
        };
        let mut params = EngineParams::new(chunking, search);
        params.embed_batch_size = self.embedding.batch_size;
        params.on_embedding_failure = self.embedding.on_failure;
        Ok(params)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.target_size == 0 {
        bail!("chunking.target_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.target_size {
        bail!("chunking.overlap must be < chunking.target_size");
    }

    // Retrieval
    if config.retrieval.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }
    if config.retrieval.snippet_width == 0 {
        bail!("retrieval.snippet_width must be > 0");
    }
    if !(config.retrieval.dedup_similarity > 0.0 && config.retrieval.dedup_similarity <= 1.0) {
        bail!("retrieval.dedup_similarity must be in (0.0, 1.0]");
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.query_timeout_secs == 0 {
        bail!("embedding.query_timeout_secs must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    // Ingest
    if config.ingest.include_globs.is_empty() {
        bail!("ingest.include_globs must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("[db]\npath = \"./data/docfuse.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.target_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.chunking.unit, ChunkUnit::Chars);
        assert_eq!(config.retrieval.final_limit, 5);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.on_failure, EmbeddingFailurePolicy::KeywordOnly);
        assert_eq!(config.embedding.query_timeout_secs, 5);
        assert_eq!(config.ingest.max_file_bytes, 52_428_800);
        assert!(config.ingest.include_globs.contains(&"**/*.docx".to_string()));
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [db]
            path = "/tmp/x.sqlite"

            [chunking]
            target_size = 200
            overlap = 20
            unit = "words"

            [retrieval]
            hybrid_alpha = 0.3
            final_limit = 10

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768
            url = "http://gpu:11434"
            on_failure = "reject"

            [ingest]
            include_globs = ["**/*.md"]
            exclude_globs = ["drafts/**"]
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.unit, ChunkUnit::Words);
        assert_eq!(config.embedding.on_failure, EmbeddingFailurePolicy::Reject);
        assert_eq!(config.embedding.url.as_deref(), Some("http://gpu:11434"));

        let params = config.engine_params().unwrap();
        assert_eq!(params.chunking.target_size(), 200);
        assert!((params.search.hybrid_alpha - 0.3).abs() < 1e-12);
        assert_eq!(params.on_embedding_failure, EmbeddingFailurePolicy::Reject);
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_target() {
        let err = parse("[db]\npath = \"x\"\n[chunking]\ntarget_size = 100\noverlap = 100\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rejects_zero_target() {
        assert!(parse("[db]\npath = \"x\"\n[chunking]\ntarget_size = 0\noverlap = 0\n").is_err());
    }

    #[test]
    fn test_rejects_alpha_out_of_range() {
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\nhybrid_alpha = 1.5\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        assert!(parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n"
        )
        .is_err());
    }

    #[test]
    fn test_rejects_zero_query_timeout() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nquery_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("query_timeout_secs"));
    }

    #[test]
    fn test_rejects_unknown_failure_policy() {
        assert!(parse("[db]\npath = \"x\"\n[embedding]\non_failure = \"ignore\"\n").is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/docfuse.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
