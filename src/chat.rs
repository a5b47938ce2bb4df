//! The interactive `eqt chat` loop and the one-shot `eqt ask` command.
//!
//! Lines starting with `:` are commands; anything else is a question about
//! the loaded content. Every failure is printed and the loop carries on.

use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use std::path::{Path, PathBuf};

use crate::account;
use crate::config::Config;
use crate::corpus::{BatchResult, CorpusError};
use crate::export::{self, ExportOptions, TranscriptFont};
use crate::fetch::FetchOptions;
use crate::llm;
use crate::models::{DocumentKind, Role};
use crate::progress::ProgressMode;
use crate::qa::{QaEngine, QaError};
use crate::session::Session;

const HELP: &str = "\
Load content (each load replaces the previous content):
  :pdf <path>          load a PDF document
  :csv <path>          load a CSV file
  :txt <path>          load a UTF-8 text file
  :load <path>         load a file, detecting the type from its extension
  :urls <u1> [u2] [u3] fetch up to three web articles
  :text <text>         use the given text directly

Session:
  :clear               remove the loaded content
  :stats               character and word counts of the content
  :source              where the content came from
  :history             show the conversation so far
  :export <file.pdf>   save the conversation as a PDF
  :reset               clear content and conversation
  :help                show this help
  :quit                leave

Anything else is asked as a question about the loaded content.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Load {
        kind: Option<DocumentKind>,
        path: PathBuf,
    },
    Urls(Vec<String>),
    Text(String),
    Clear,
    Stats,
    Source,
    History,
    Export(PathBuf),
    Reset,
    Help,
    Quit,
    Ask(String),
    Empty,
    Invalid(String),
}

pub fn parse_command(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ChatCommand::Ask(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let usage = match name {
        "pdf" => Some(":pdf <path>"),
        "csv" => Some(":csv <path>"),
        "txt" => Some(":txt <path>"),
        "load" => Some(":load <path>"),
        "urls" => Some(":urls <u1> [u2] [u3]"),
        "text" => Some(":text <text>"),
        "export" => Some(":export <file.pdf>"),
        _ => None,
    };
    if let Some(usage) = usage {
        if arg.is_empty() {
            return ChatCommand::Invalid(format!("usage: {}", usage));
        }
    }

    match name {
        "pdf" => load(Some(DocumentKind::Pdf), arg),
        "csv" => load(Some(DocumentKind::Csv), arg),
        "txt" => load(Some(DocumentKind::Txt), arg),
        "load" => load(None, arg),
        "urls" => ChatCommand::Urls(arg.split_whitespace().map(str::to_string).collect()),
        "text" => ChatCommand::Text(arg.to_string()),
        "export" => ChatCommand::Export(PathBuf::from(arg)),
        "clear" => ChatCommand::Clear,
        "stats" => ChatCommand::Stats,
        "source" => ChatCommand::Source,
        "history" => ChatCommand::History,
        "reset" => ChatCommand::Reset,
        "help" | "h" | "?" => ChatCommand::Help,
        "quit" | "q" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("unknown command ':{}' (try :help)", other)),
    }
}

fn load(kind: Option<DocumentKind>, path: &str) -> ChatCommand {
    ChatCommand::Load {
        kind,
        path: PathBuf::from(path),
    }
}

/// Builds a session for `username` with the configured model and fetcher.
pub fn build_session(config: &Config, username: &str) -> Result<Session> {
    let model = llm::create_model(&config.model)?;
    let engine = QaEngine::from_config(model, config);
    Session::new(username, engine, FetchOptions::from(&config.fetch))
}

pub async fn run_chat(config: &Config, username: &str, progress: ProgressMode) -> Result<()> {
    account::login(config, username).await?;
    let mut session = build_session(config, username)?;

    if let Some(welcome) = session.messages().first() {
        println!("{}\n", welcome.content);
    }
    println!("Type :help for commands.");

    let mut editor = rustyline::DefaultEditor::new()?;
    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let command = parse_command(&line);
        if command == ChatCommand::Quit {
            break;
        }
        execute(&mut session, config, command, progress).await;
    }

    println!("Goodbye.");
    Ok(())
}

/// Runs one command against the session, printing results and failures.
pub async fn execute(
    session: &mut Session,
    config: &Config,
    command: ChatCommand,
    progress: ProgressMode,
) {
    match command {
        ChatCommand::Empty | ChatCommand::Quit => {}
        ChatCommand::Invalid(message) => println!("{}", message),
        ChatCommand::Help => println!("{}", HELP),
        ChatCommand::Load { kind, path } => {
            let result = match kind {
                Some(kind) => load_as(session, kind, &path),
                None => session.load_path(&path).map(|_| ()),
            };
            report_load(session, result);
        }
        ChatCommand::Urls(urls) => {
            let reporter = progress.reporter();
            let result = session.load_web_articles(&urls, reporter.as_ref()).await;
            if let Ok(batch) = &result {
                print_batch(batch);
            }
            report_load(session, result.map(|_| ()));
        }
        ChatCommand::Text(text) => {
            let result = session.load_direct_text(&text);
            report_load(session, result);
        }
        ChatCommand::Clear => {
            session.clear_content();
            println!("Content cleared. Please load new content to continue.");
        }
        ChatCommand::Stats => {
            if session.corpus().is_loaded() {
                println!("{}", session.stats().render());
            } else {
                println!("No content loaded.");
            }
        }
        ChatCommand::Source => match session.corpus().source() {
            Some(source) => println!("Current source: {}", source),
            None => println!("No content loaded."),
        },
        ChatCommand::History => print_history(session),
        ChatCommand::Export(path) => export_to(session, config, &path),
        ChatCommand::Reset => {
            session.reset();
            println!("Session reset.");
        }
        ChatCommand::Ask(question) => match session.ask(&question).await {
            Ok(answer) => println!("\n{}:\n{}\n", session.assistant_name(), answer),
            Err(QaError::NoContent) => println!("Please load some content first!"),
            Err(e) => println!("Error generating answer: {}", e),
        },
    }
}

fn load_as(session: &mut Session, kind: DocumentKind, path: &Path) -> Result<(), CorpusError> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    session.load_document(kind, &name, &bytes)
}

fn report_load(session: &Session, result: Result<(), CorpusError>) {
    match result {
        Ok(()) => {
            if let Some(source) = session.corpus().source() {
                println!("Content loaded from: {}", source);
            }
            println!("{}", session.stats().render());
        }
        Err(e) => println!("Error loading content: {}", e),
    }
}

fn print_batch(batch: &BatchResult) {
    for outcome in &batch.outcomes {
        match &outcome.result {
            Ok(_) => println!("  ok      {}", outcome.url),
            Err(e) => println!("  failed  {}", e),
        }
    }
    if batch.failed() > 0 {
        println!(
            "{} of {} articles could not be fetched.",
            batch.failed(),
            batch.outcomes.len()
        );
    }
}

fn print_history(session: &Session) {
    for message in session.messages() {
        let label = match message.role {
            Role::User => "You".to_string(),
            Role::Assistant => session.assistant_name().to_string(),
            Role::System => "*".to_string(),
        };
        println!("{}: {}\n", label, message.content);
    }
}

fn export_to(session: &Session, config: &Config, path: &Path) {
    let options = ExportOptions {
        assistant_name: session.assistant_name().to_string(),
        unicode_font: Some(config.export.unicode_font.clone()),
    };
    match export::write_transcript(session.messages(), &options, path) {
        Ok(exported) => {
            println!(
                "Transcript written to {} ({} page{}).",
                path.display(),
                exported.pages,
                if exported.pages == 1 { "" } else { "s" }
            );
            if exported.font == TranscriptFont::Helvetica && exported.substituted_chars > 0 {
                println!(
                    "Note: {} character(s) could not be rendered without the Unicode font ({}) and were replaced with '?'.",
                    exported.substituted_chars,
                    config.export.unicode_font.display()
                );
            }
        }
        Err(e) => println!("Error exporting transcript: {:#}", e),
    }
}

/// What `eqt ask` should load before answering.
#[derive(Debug, Clone)]
pub enum AskSource {
    Files(Vec<PathBuf>),
    Urls(Vec<String>),
    Text(String),
}

/// One-shot: log in, load the content, answer one question on stdout.
pub async fn run_ask(
    config: &Config,
    username: &str,
    source: AskSource,
    question: &str,
    progress: ProgressMode,
) -> Result<()> {
    account::login(config, username).await?;
    let mut session = build_session(config, username)?;

    match source {
        AskSource::Files(paths) => {
            // Each file replaces the previous one; the last load wins.
            for path in &paths {
                session.load_path(path)?;
            }
        }
        AskSource::Urls(urls) => {
            let reporter = progress.reporter();
            let batch = session.load_web_articles(&urls, reporter.as_ref()).await?;
            for outcome in &batch.outcomes {
                if let Err(e) = &outcome.result {
                    eprintln!("warning: {}", e);
                }
            }
        }
        AskSource::Text(text) => session.load_direct_text(&text)?,
    }

    match session.ask(question).await {
        Ok(answer) => {
            println!("{}", answer);
            Ok(())
        }
        Err(e) => bail!("{}", e),
    }
}
