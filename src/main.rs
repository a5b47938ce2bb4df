//! # EquityTool CLI (`eqt`)
//!
//! ## Usage
//!
//! ```bash
//! eqt --config ./config/eqt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `eqt init` | Create the SQLite database and schema |
//! | `eqt signup <username>` | Create an account (password read from stdin) |
//! | `eqt chat --user <u>` | Log in and start an interactive session |
//! | `eqt ask --user <u> ... "<question>"` | Load content, answer one question |
//!
//! ## Examples
//!
//! ```bash
//! eqt init --config ./config/eqt.toml
//! eqt signup alice
//! eqt chat --user alice
//! eqt ask --user alice --url https://example.com/a --url https://example.com/b "Compare them"
//! eqt ask --user alice --text "Revenue grew 12%" "How much did revenue grow?"
//! ```
//!
//! Logs go to stderr; set `RUST_LOG=equity_tool=debug` for detail.

use anyhow::bail;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use equity_tool::chat::{self, AskSource};
use equity_tool::progress::ProgressMode;
use equity_tool::{account, config, migrate};

/// EquityTool: ask questions about documents, web articles and text.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/eqt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "eqt",
    about = "EquityTool: a research assistant for documents, web articles and text",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/eqt.toml")]
    config: PathBuf,

    /// Web fetch progress on stderr: `off`, `human` or `json`.
    /// Defaults to `human` when stderr is a terminal.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `users` table.
    /// Running it again is safe.
    Init,

    /// Create an account.
    ///
    /// Reads the password and its confirmation from stdin.
    Signup {
        username: String,
    },

    /// Log in and start an interactive chat session.
    Chat {
        #[arg(long)]
        user: String,
    },

    /// Load content, ask one question and print the answer.
    #[command(group(
        ArgGroup::new("content")
            .required(true)
            .args(["file", "url", "text"])
    ))]
    Ask {
        #[arg(long)]
        user: String,

        /// PDF, CSV or TXT file. Repeatable; the last file loaded wins.
        #[arg(long)]
        file: Vec<PathBuf>,

        /// Web article URL. Repeatable, up to `fetch.max_urls`.
        #[arg(long)]
        url: Vec<String>,

        /// Use this text as the content.
        #[arg(long)]
        text: Option<String>,

        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let progress = match cli.progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some(s) => match ProgressMode::parse(s) {
            Some(mode) => mode,
            None => bail!("Unknown progress mode: '{}'. Use off, human or json.", s),
        },
    };

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Signup { username } => {
            account::run_signup(&cfg, &username).await?;
        }
        Commands::Chat { user } => {
            chat::run_chat(&cfg, &user, progress).await?;
        }
        Commands::Ask {
            user,
            file,
            url,
            text,
            question,
        } => {
            let source = if let Some(text) = text {
                AskSource::Text(text)
            } else if !url.is_empty() {
                AskSource::Urls(url)
            } else {
                AskSource::Files(file)
            };
            chat::run_ask(&cfg, &user, source, &question, progress).await?;
        }
    }

    Ok(())
}
