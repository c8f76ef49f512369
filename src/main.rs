//! # Study Forge CLI (`forge`)
//!
//! ## Usage
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge summarize <file>` | Summarize a document (tldr, bullet, detailed) |
//! | `forge flashcards <file>` | Generate flashcards from a document |
//! | `forge flashcards --from-summary <file>` | Generate 10 flashcards from summary text |
//! | `forge quiz <cards.json>` | Build a 5-question quiz from flashcards |
//! | `forge prove-it <cards.json>` | Interactive free-response check, graded |
//! | `forge init-config` | Write a starter config file |
//! | `forge completions <shell>` | Print shell completions |
//!
//! The API key is read from the environment variable named in
//! `[completion].api_key_env` (default `GEMINI_API_KEY`).

use std::path::PathBuf;

use anyhow::bail;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use study_forge::commands;
use study_forge::config;
use study_forge::logging::{init_tracing, LoggingConfig};
use study_forge::Synthesizer;
use study_forge_core::cancel::CancelFlag;

/// Study Forge: summaries, flashcards, quizzes, and prove-it checks from
/// your documents.
#[derive(Parser)]
#[command(name = "forge", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/forge.toml`. When the file does not exist the
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = "./config/forge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a PDF, text file, or image.
    Summarize {
        file: PathBuf,
        /// tldr, bullet, or detailed. Unrecognized labels mean bullet.
        #[arg(long, default_value = "bullet")]
        mode: String,
    },

    /// Generate flashcards from a document or from summary text.
    Flashcards {
        /// Document to read. Omit when using `--from-summary`.
        #[arg(required_unless_present = "from_summary", conflicts_with = "from_summary")]
        file: Option<PathBuf>,
        /// Plain-text summary to draw exactly 10 cards from.
        #[arg(long)]
        from_summary: Option<PathBuf>,
        /// Number of cards (1-50).
        #[arg(long, default_value_t = 10)]
        count: usize,
        /// easy, medium, or hard.
        #[arg(long, default_value = "medium")]
        difficulty: String,
    },

    /// Build a multiple-choice quiz from a JSON flashcard file.
    Quiz {
        cards: PathBuf,
        /// standard, scenario, or basic.
        #[arg(long, default_value = "standard")]
        style: String,
    },

    /// Answer three free-response questions about a flashcard file and get
    /// them graded.
    ProveIt { cards: PathBuf },

    /// Write a commented starter config to the `--config` path.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print shell completions.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(LoggingConfig::from_env());

    // Commands that don't require config
    match &cli.command {
        Commands::InitConfig { force } => return commands::init_config(&cli.config, *force),
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "forge", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config_or_default(&cli.config)?;
    let synth = Synthesizer::from_config(&cfg)?;
    let max_bytes = cfg.documents.max_bytes;

    let cancel = CancelFlag::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("cancelling after the current request");
            on_ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Summarize { file, mode } => {
            commands::run_summarize(&synth, &file, &mode, max_bytes, &cancel).await?;
        }
        Commands::Flashcards {
            file,
            from_summary,
            count,
            difficulty,
        } => match (file, from_summary) {
            (_, Some(summary)) => {
                commands::run_flashcards_from_summary(&synth, &summary, &cancel).await?;
            }
            (Some(file), None) => {
                commands::run_flashcards(&synth, &file, count, &difficulty, max_bytes, &cancel)
                    .await?;
            }
            (None, None) => bail!("either a file or --from-summary is required"),
        },
        Commands::Quiz { cards, style } => {
            commands::run_quiz(&synth, &cards, &style, &cancel).await?;
        }
        Commands::ProveIt { cards } => {
            commands::run_prove_it(&synth, &cards, &cancel).await?;
        }
        Commands::InitConfig { .. } | Commands::Completions { .. } => {}
    }

    if cancel.is_cancelled() {
        bail!("cancelled");
    }
    Ok(())
}
