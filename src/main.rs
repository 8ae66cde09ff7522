//! # Fiche CLI (`fiche`)
//!
//! Build a corpus of study documents, then read TF-IDF summaries and
//! four-section revision cards that stay in sync with it.
//!
//! ## Usage
//!
//! ```bash
//! fiche --config ./config/fiche.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fiche init` | Create the SQLite database |
//! | `fiche add <files>` | Ingest `.txt`, `.md`, `.rtf`, `.docx` or `.pdf` files |
//! | `fiche add-text "<text>"` | Ingest text directly |
//! | `fiche sync <dir>` | Mirror a directory into the corpus |
//! | `fiche remove <id>` | Remove a document |
//! | `fiche list` | List documents |
//! | `fiche terms <id>` | Show a document's highest-weighted terms |
//! | `fiche select <ids>` | Best sentences of some documents within a budget |
//! | `fiche summary <id>` | Print (or save) a document's summary |
//! | `fiche card create/show/remove` | Manage revision cards |
//! | `fiche status` | Freshness of every summary and card |
//! | `fiche report` | Write CSV reports |
//! | `fiche stats` | Corpus statistics |
//!
//! ## Examples
//!
//! ```bash
//! fiche init
//! fiche sync ~/cours/histoire
//! fiche card create guerre-froide --theme "guerre froide"
//! fiche card show guerre-froide --out fiches/guerre-froide.md
//! ```
//!
//! Logs go to stderr, filtered by `[log].level` or `RUST_LOG`.

use clap::{Parser, Subcommand};
use fiche_core::select::Budget;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fiche::{card, config, documents, ingest, migrate, report, stats, status, summary};

/// Fiche: TF-IDF summaries and revision cards for a personal corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fiche.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fiche",
    about = "Fiche: TF-IDF summaries and revision cards for a personal document corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fiche.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ingest one or more files.
    ///
    /// Each file becomes a document whose id is its lowercased file stem.
    /// Re-adding a file with changed text updates the document and marks
    /// its summary and cards out of date.
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Language code recorded with the documents (e.g. `fr`, `en`).
        #[arg(long)]
        lang: Option<String>,

        /// Explicit document id (single file only).
        #[arg(long)]
        id: Option<String>,
    },

    /// Ingest text given on the command line.
    AddText {
        text: String,

        /// Title; defaults to the first line of the text.
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        lang: Option<String>,

        /// Explicit document id; a UUID is generated otherwise.
        #[arg(long)]
        id: Option<String>,
    },

    /// Mirror a directory: ingest new and changed files, remove documents
    /// whose file disappeared.
    Sync { dir: PathBuf },

    /// Remove a document and its summary.
    Remove { id: String },

    /// List documents.
    List,

    /// Show the highest-weighted terms of a document.
    Terms {
        id: String,

        /// Number of terms to show.
        #[arg(short, default_value_t = 10)]
        k: usize,
    },

    /// Rank the sentences of one or more documents and print those that
    /// fit the budget. Ties go to the document listed first.
    Select {
        #[arg(required = true)]
        ids: Vec<String>,

        /// Budget in characters (default 600).
        #[arg(long)]
        chars: Option<usize>,

        /// Budget in words instead of characters.
        #[arg(long, conflicts_with = "chars")]
        tokens: Option<usize>,
    },

    /// Print a document's summary, regenerating it if out of date.
    Summary {
        id: String,

        /// Write Markdown to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Manage revision cards.
    Card {
        #[command(subcommand)]
        action: CardAction,
    },

    /// Show the freshness of every summary and card.
    Status,

    /// Write `summaries.csv` and `cards.csv` to the reports directory.
    Report,

    /// Show corpus statistics.
    Stats,
}

#[derive(Subcommand)]
enum CardAction {
    /// Define the document group of a card.
    Create {
        name: String,

        /// Comma-separated document ids.
        #[arg(long, value_delimiter = ',', conflicts_with_all = ["theme", "all"])]
        docs: Option<Vec<String>>,

        /// Documents most similar to this theme.
        #[arg(long, conflicts_with = "all")]
        theme: Option<String>,

        /// The whole corpus.
        #[arg(long)]
        all: bool,
    },

    /// Print a card, regenerating it if out of date.
    Show {
        name: String,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Remove a card and its group.
    Remove { name: String },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    init_tracing(&cfg.log.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
        }
        Commands::Add { paths, lang, id } => {
            ingest::run_add(&cfg, &paths, lang, id).await?;
        }
        Commands::AddText {
            text,
            title,
            lang,
            id,
        } => {
            ingest::run_add_text(&cfg, &text, title, lang, id).await?;
        }
        Commands::Sync { dir } => {
            ingest::run_sync(&cfg, &dir).await?;
        }
        Commands::Remove { id } => {
            ingest::run_remove(&cfg, &id).await?;
        }
        Commands::List => {
            documents::run_list(&cfg).await?;
        }
        Commands::Terms { id, k } => {
            documents::run_terms(&cfg, &id, k).await?;
        }
        Commands::Select { ids, chars, tokens } => {
            let budget = match tokens {
                Some(n) => Budget::Tokens(n),
                None => Budget::Chars(chars.unwrap_or(600)),
            };
            documents::run_select(&cfg, &ids, budget).await?;
        }
        Commands::Summary { id, out } => {
            summary::run_summary(&cfg, &id, out.as_deref()).await?;
        }
        Commands::Card { action } => match action {
            CardAction::Create {
                name,
                docs,
                theme,
                all,
            } => {
                card::run_card_create(&cfg, &name, docs, theme, all).await?;
            }
            CardAction::Show { name, out } => {
                card::run_card_show(&cfg, &name, out.as_deref()).await?;
            }
            CardAction::Remove { name } => {
                card::run_card_remove(&cfg, &name).await?;
            }
        },
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Report => {
            report::run_report(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
