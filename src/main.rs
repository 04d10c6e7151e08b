//! # notegraph CLI
//!
//! ## Usage
//!
//! ```bash
//! notegraph --config ./config/notegraph.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `notegraph init` | Create the SQLite database and run schema migrations |
//! | `notegraph ingest` | Walk the vault, chunk, embed, and store every file |
//! | `notegraph get <id>` | Print a stored chunk as JSON |
//! | `notegraph search "<query>"` | Vector search over stored chunks |
//! | `notegraph stats` | Chunk totals, embedding coverage, per-type breakdown |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use notegraph::progress::ProgressMode;
use notegraph::{config, db, get, ingest, logging, migrate, search, stats};

/// notegraph: ingest an Obsidian-style vault into an embedding store.
///
/// All commands read a TOML configuration file. See
/// `config/notegraph.example.toml` for every option.
#[derive(Parser)]
#[command(name = "notegraph", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/notegraph.toml")]
    config: PathBuf,

    /// Debug-level logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest every file under the vault root.
    Ingest {
        /// Extract and chunk only; print counts without embedding or storing.
        #[arg(long)]
        dry_run: bool,

        /// Do not re-embed chunks whose id is already stored.
        #[arg(long)]
        skip_existing: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,

        /// Progress on stderr: `off`, `human`, or `json`. Defaults to human
        /// on a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Print a stored chunk by id.
    Get {
        id: String,
    },

    /// Vector search over stored chunks.
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Store statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },
}

fn progress_mode(flag: Option<&str>) -> anyhow::Result<ProgressMode> {
    match flag {
        None => Ok(ProgressMode::default_for_tty()),
        Some("off") => Ok(ProgressMode::Off),
        Some("human") => Ok(ProgressMode::Human),
        Some("json") => Ok(ProgressMode::Json),
        Some(other) => anyhow::bail!("invalid --progress value: {} (off, human, json)", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            dry_run,
            skip_existing,
            limit,
            json,
            progress,
        } => {
            let reporter = progress_mode(progress.as_deref())?.reporter();
            let flags = ingest::RunFlags {
                dry_run,
                skip_existing,
                limit,
            };
            let summary = ingest::run_ingest(&cfg, &flags, reporter.as_ref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                ingest::print_summary(&summary);
            }
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Search { query, limit, json } => {
            search::run_search(&cfg, &query, limit, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
    }

    Ok(())
}
