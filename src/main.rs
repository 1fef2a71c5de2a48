//! # kgs CLI
//!
//! Command-line front for the engine bridge. Every command runs one engine
//! session, except `upload` (filesystem only) and `serve` (HTTP API).
//!
//! ## Usage
//!
//! ```bash
//! kgs --config ./config/kgs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kgs search <term>` | Search indexed documents |
//! | `kgs process` | Index everything in the documents directory |
//! | `kgs history` | Show the engine's search history |
//! | `kgs undo` | Undo the last search |
//! | `kgs path <a> <b>` | Trace a path between two terms |
//! | `kgs upload <files>` | Copy files into the documents directory |
//! | `kgs serve` | Start the HTTP API |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use kgs_bridge::config::{self, Config};
use kgs_bridge::models::{Operation, UploadedFile};
use kgs_bridge::orchestrator::Orchestrator;
use kgs_bridge::{render, server, upload};

const DEFAULT_CONFIG: &str = "./config/kgs.toml";

/// kgs: drive the knowledge-graph search engine from the command line.
#[derive(Parser)]
#[command(
    name = "kgs",
    about = "Drive the knowledge-graph search engine console as a structured service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default file is missing, built-in defaults are used and the
    /// engine is expected at `../c-engine/search_engine`.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Print reports as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search indexed documents for a term.
    Search {
        /// The search term.
        term: String,
    },

    /// Index every document in the documents directory.
    Process,

    /// Show the engine's search history.
    History,

    /// Undo the last search.
    Undo,

    /// Trace the shortest path between two terms in the knowledge graph.
    Path {
        /// Start term.
        from: String,
        /// End term.
        to: String,
    },

    /// Copy local files into the engine's documents directory.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Start the HTTP API.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let cfg = load(&cli.config)?;

    let op = match cli.command {
        Commands::Search { term } => Operation::Search(term),
        Commands::Process => Operation::ProcessDocuments,
        Commands::History => Operation::ShowHistory,
        Commands::Undo => Operation::Undo,
        Commands::Path { from, to } => Operation::TracePath(from, to),
        Commands::Upload { files } => {
            return run_upload(&cfg, &files, cli.json).await;
        }
        Commands::Serve => {
            return server::run_server(&cfg).await;
        }
    };

    let orchestrator = Orchestrator::new(&cfg);
    let out = orchestrator.execute(op).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render::render_text(&out));
    }

    Ok(())
}

fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        tracing::debug!("no config file, using defaults");
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

async fn run_upload(cfg: &Config, paths: &[PathBuf], json: bool) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        files.push(UploadedFile { filename, bytes });
    }

    let saved = upload::save_files(&cfg.engine.documents_dir, files).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        for file in &saved {
            println!("{} ({} bytes) -> {}", file.filename, file.size, file.path.display());
        }
        println!("Uploaded {} files.", saved.len());
    }
    Ok(())
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("kgs_bridge=debug,kgs=debug,info")
        } else {
            EnvFilter::new("kgs_bridge=info,kgs=info,warn")
        }
    });

    // stdout carries reports; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
