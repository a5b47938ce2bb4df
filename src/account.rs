//! `eqt signup` and the login step shared by `chat` and `ask`.
//!
//! On a terminal, passwords are typed without echo; piped stdin is read as
//! plain lines so the commands also work from scripts.

use anyhow::{bail, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, Write};

use crate::auth::{AuthError, SqliteCredentialStore};
use crate::config::Config;
use crate::traits::CredentialStore;

/// Prompts on stderr and reads one line from stdin without its line ending.
pub fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input)?;
    if read == 0 {
        bail!("unexpected end of input");
    }
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Reads a password, hiding the input when stdin is a terminal.
pub fn prompt_password(prompt: &str) -> Result<String> {
    if atty::is(atty::Stream::Stdin) {
        read_hidden(prompt)
    } else {
        prompt_line(prompt)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Submit,
    Cancel,
}

fn apply_key(buffer: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    match key.code {
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Cancel,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) && buffer.is_empty() => {
            KeyOutcome::Cancel
        }
        KeyCode::Backspace => {
            buffer.pop();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            buffer.push(c);
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

/// Restores cooked mode even when reading fails.
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_hidden(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;

    let mut password = String::new();
    let outcome = {
        terminal::enable_raw_mode()?;
        let _guard = RawModeGuard;
        loop {
            if let Event::Key(key) = event::read()? {
                match apply_key(&mut password, key) {
                    KeyOutcome::Continue => continue,
                    done => break done,
                }
            }
        }
    };
    eprintln!();

    if outcome == KeyOutcome::Cancel {
        bail!("password entry cancelled");
    }
    Ok(password)
}

pub async fn run_signup(config: &Config, username: &str) -> Result<()> {
    let password = prompt_password("Password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match.");
    }

    let store = SqliteCredentialStore::open(config).await?;
    match store.create(username, &password).await {
        Ok(()) => {
            println!("Account created for {}. You can now log in.", username);
            Ok(())
        }
        Err(e @ AuthError::DuplicateUsername) => bail!("{}", e),
        Err(e) => Err(e.into()),
    }
}

/// Verifies `username` against a password read from stdin.
pub async fn login(config: &Config, username: &str) -> Result<()> {
    let password = prompt_password("Password: ")?;
    let store = SqliteCredentialStore::open(config).await?;
    if !store.verify(username, &password).await? {
        bail!("Invalid username or password.");
    }
    tracing::info!(user = %username, "logged in");
    Ok(())
}
