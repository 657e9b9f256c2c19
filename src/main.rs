//! # Reference Index CLI (`refx`)
//!
//! The `refx` binary builds and checks the reference corpus site, and
//! manages the searchable catalog behind the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! refx --config ./config/refx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `refx init` | Create the SQLite catalog and run schema migrations |
//! | `refx scan` | List scanned documents and their front-matter status |
//! | `refx index` | Print the category index |
//! | `refx check` | Validate front matter and internal links |
//! | `refx build` | Render the static site |
//! | `refx sync` | Bring the catalog in line with the corpus |
//! | `refx search "<query>"` | Keyword search over the catalog |
//! | `refx get <path>` | Retrieve a catalogued document by corpus path |
//! | `refx stats` | Catalog statistics |
//! | `refx export` | Write the JSON index |
//! | `refx serve` | Start the HTTP server |
//! | `refx completions <shell>` | Print shell completions |

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use reference_index::{
    config, export, get, index, ingest, links, logging, migrate, scan, search, server, site,
    stats,
};

/// Reference Index CLI: a static site and catalog for a Markdown reference
/// corpus.
///
/// All commands except `completions` read a TOML configuration file given by
/// `--config`. See `config/refx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "refx",
    about = "Reference Index: static site, link checker, and catalog for a Markdown reference corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/refx.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). `REFX_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (documents, chunks, chunks_fts). Running it more than once is safe.
    Init,

    /// List every scanned document and its front-matter status.
    Scan,

    /// Print the category index.
    Index {
        /// Output format: `table`, `markdown`, or `json`.
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Check front matter and internal links.
    ///
    /// Fails when any internal link (including "See Also" entries) points
    /// at a document that does not exist.
    Check {
        /// Also fail when any document has invalid front matter.
        #[arg(long)]
        strict: bool,
    },

    /// Render the static site.
    ///
    /// Writes one page per document plus the home, categories, and tags
    /// pages, `index.json`, and `manifest.json`. Unchanged files are left
    /// untouched and pages of removed documents are deleted.
    Build {
        /// Output directory (overrides `[output].dir`).
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Bring the catalog in line with the corpus.
    Sync {
        /// Rewrite every document even when its content hash is unchanged.
        #[arg(long)]
        full: bool,

        /// Show document and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Keyword search over the catalog.
    Search {
        /// Search query text.
        query: String,

        /// Only return documents in this category (case-insensitive).
        #[arg(long)]
        category: Option<String>,

        /// Only return documents carrying this tag (case-insensitive).
        #[arg(long)]
        tag: Option<String>,

        /// Maximum results (overrides `[retrieval].final_limit`).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Retrieve a catalogued document by its corpus path.
    Get {
        /// Corpus-relative path, e.g. `retrieval/rank-fusion.md`.
        path: String,
    },

    /// Show catalog statistics.
    Stats,

    /// Export the corpus index as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print shell completions.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "refx", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Scan => {
            scan::run_scan(&cfg)?;
        }
        Commands::Index { format } => {
            index::run_index(&cfg, &format)?;
        }
        Commands::Check { strict } => {
            links::run_check(&cfg, strict)?;
        }
        Commands::Build { out } => {
            site::run_build(&cfg, out)?;
        }
        Commands::Sync { full, dry_run } => {
            ingest::run_sync(&cfg, full, dry_run).await?;
        }
        Commands::Search {
            query,
            category,
            tag,
            limit,
        } => {
            let params = search::SearchParams {
                query,
                category,
                tag,
                limit,
            };
            search::run_search(&cfg, params).await?;
        }
        Commands::Get { path } => {
            get::run_get(&cfg, &path).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref())?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
