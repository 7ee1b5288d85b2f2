//! # docfuse CLI
//!
//! ```bash
//! docfuse --config ./config/docfuse.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docfuse init` | Create the SQLite database and schema |
//! | `docfuse ingest <paths>...` | Ingest files and directories |
//! | `docfuse search "<query>"` | Keyword, vector or hybrid search |
//! | `docfuse get <id>` | Print a document and its chunks |
//! | `docfuse list` | List documents, oldest first |
//! | `docfuse delete <id>` | Remove a document everywhere |
//! | `docfuse stats` | Corpus counters and database size |
//! | `docfuse completions <shell>` | Shell completion script |
//!
//! Logs go to stderr (`-v` for info, `-vv` for debug, or `RUST_LOG`);
//! command output goes to stdout.

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use docfuse::config;
use docfuse::{db, delete, get, ingest, migrate, search, stats};

/// docfuse: local hybrid (keyword + semantic) retrieval over office documents.
#[derive(Parser)]
#[command(
    name = "docfuse",
    version,
    about = "Local hybrid (keyword + semantic) retrieval over office documents",
    long_about = "docfuse ingests PDF, DOCX, PPTX, XLSX and text files, rejects exact and \
    near-verbatim duplicates, chunks and indexes them for BM25 keyword search and optional \
    vector search, and answers queries with fused, deduplicated, cited snippets."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docfuse.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and schema. Safe to run repeatedly.
    Init,

    /// Ingest files or directories.
    ///
    /// Directories are walked recursively and filtered by the
    /// `[ingest]` include/exclude globs.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// List what would be ingested without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search ingested documents.
    Search {
        /// Free-text query.
        query: String,

        /// keyword, vector (or semantic), hybrid.
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum results (defaults to `retrieval.final_limit`).
        #[arg(long)]
        limit: Option<usize>,

        /// Show the scoring breakdown for each hit.
        #[arg(long)]
        explain: bool,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a document with all of its chunks.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List all documents.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Delete a document from the indexes and the database.
    Delete { id: String },

    /// Show corpus statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "docfuse", &mut io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { paths, dry_run } => {
            ingest::run_ingest(&cfg, &paths, dry_run).await?;
        }
        Commands::Search {
            query,
            mode,
            limit,
            explain,
            json,
        } => {
            search::run_search(
                &cfg,
                search::SearchArgs {
                    query: &query,
                    mode: &mode,
                    limit,
                    explain,
                    json,
                },
            )
            .await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::List { json } => {
            get::run_list(&cfg, json).await?;
        }
        Commands::Delete { id } => {
            delete::run_delete(&cfg, &id).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
