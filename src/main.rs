//! # LIDIA Browser CLI (`lidia`)
//!
//! The `lidia` binary fetches annotation data from Zotero, rebuilds the
//! normalized annotation schema and prints annotations for review.
//!
//! ## Usage
//!
//! ```bash
//! lidia --config ./config/lidia.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lidia init` | Create the SQLite database and schema |
//! | `lidia fetch` | Download items changed since the last fetch |
//! | `lidia populate` | Reconcile raw items into annotations |
//! | `lidia reset` | Delete all normalized data |
//! | `lidia list` | List annotations in document order |
//! | `lidia show <id>` | Show one annotation |
//! | `lidia stats` | Row counts and library version |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lidia_browser::{config, get, ingest, migrate, stats, sync};

/// LIDIA Browser CLI: import and browse linguistic annotations from Zotero.
#[derive(Parser)]
#[command(
    name = "lidia",
    about = "LIDIA Browser — import and browse linguistic annotations from a Zotero library",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lidia.toml")]
    config: PathBuf,

    /// Log debug output (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all raw and normalized tables.
    /// Running it again is safe.
    Init,

    /// Fetch publications and annotations from Zotero.
    ///
    /// Compares the remote library version with the one stored locally and
    /// downloads only items modified since then.
    Fetch {
        /// Ignore the stored library version and fetch everything.
        #[arg(long)]
        full: bool,
    },

    /// Rebuild annotations from the fetched raw items.
    ///
    /// Parses LIDIA comments, upserts publications, languages, terms and
    /// annotations, links continuations and removes unresolved placeholders.
    Populate,

    /// Delete all normalized data (raw items are kept).
    Reset {
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },

    /// List annotations in document order.
    List {
        /// Only annotations on this attachment.
        #[arg(long)]
        publication: Option<String>,
    },

    /// Show one annotation with term groups and continuations.
    Show {
        /// LIDIA id of the annotation.
        id: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show database statistics.
    Stats,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    use std::io::Write;
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Fetch { full } => {
            sync::run_fetch(&cfg, full).await?;
        }
        Commands::Populate => {
            ingest::run_populate(&cfg).await?;
        }
        Commands::Reset { yes } => {
            if !yes && !confirm("Delete all annotations, publications and terms?")? {
                println!("Aborted.");
                return Ok(());
            }
            ingest::run_reset(&cfg).await?;
        }
        Commands::List { publication } => {
            get::run_list(&cfg, publication.as_deref()).await?;
        }
        Commands::Show { id, json } => {
            get::run_show(&cfg, &id, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
