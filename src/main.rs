//! # projrag CLI
//!
//! ```bash
//! projrag --config ./projrag.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `projrag ingest <project>` | Rebuild the project's collection from `projects/<project>/*.txt` |
//! | `projrag query <project>` | Interactive question loop against the project |
//! | `projrag ask <project> "<question>"` | Answer a single question |
//! | `projrag context <project> "<query>"` | Print the retrieved context only |
//! | `projrag stats [project]` | Show indexed collections |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use projrag::progress::ProgressMode;
use projrag::{config, ingest, retrieve_cmd, session, stats};
use projrag_core::RagError;

/// projrag: per-project retrieval-augmented generation.
///
/// Settings are read from the `--config` TOML file. If the default file
/// does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "projrag",
    about = "Per-project retrieval-augmented generation over local text files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./projrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild a project's collection from its `.txt` files.
    ///
    /// The collection is dropped and recreated before any file is read,
    /// so the index always matches the configured embedding model.
    Ingest {
        /// Project name; files are read from `<projects.root>/<project>/`.
        project: String,

        /// Show file and entry counts without touching the index.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Start an interactive question loop. Type `exit` to quit.
    Query {
        project: String,

        /// Print every ranked entry and its distance to stderr.
        #[arg(long)]
        show_distances: bool,
    },

    /// Answer one question and exit.
    Ask {
        project: String,
        question: String,

        #[arg(long)]
        show_distances: bool,
    },

    /// Print the context string retrieved for a query (no LLM call).
    Context {
        project: String,
        query: String,

        #[arg(long)]
        show_distances: bool,
    },

    /// Show indexed collections.
    Stats {
        /// Limit output to one project.
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:?}", err);
        // Same exit code clap uses for bad arguments
        let code = match err.downcast_ref::<RagError>() {
            Some(RagError::Usage(_)) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            project,
            dry_run,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, &project, dry_run, mode).await?;
        }
        Commands::Query {
            project,
            show_distances,
        } => {
            session::run_query_session(&cfg, &project, show_distances).await?;
        }
        Commands::Ask {
            project,
            question,
            show_distances,
        } => {
            session::run_ask(&cfg, &project, &question, show_distances).await?;
        }
        Commands::Context {
            project,
            query,
            show_distances,
        } => {
            retrieve_cmd::run_context(&cfg, &project, &query, show_distances).await?;
        }
        Commands::Stats { project } => {
            stats::run_stats(&cfg, project.as_deref()).await?;
        }
    }

    Ok(())
}
