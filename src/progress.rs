//! Web-article fetch progress reporting.
//!
//! Reports `completed / total` after each URL of a batch resolves so users
//! see the batch moving. Progress is emitted on **stderr** so stdout stays
//! reserved for answers. Reporting is purely observational: it never
//! influences the batch result.

use std::io::Write;

/// A single progress event for a batch fetch.
#[derive(Clone, Debug)]
pub enum FetchProgressEvent {
    /// The batch is about to start; `total` URLs will be attempted.
    Started { total: usize },
    /// One more URL has resolved (successfully or not).
    Fetched {
        url: String,
        ok: bool,
        completed: usize,
        total: usize,
    },
}

impl FetchProgressEvent {
    /// Fraction of the batch that has resolved, in `[0.0, 1.0]`.
    pub fn fraction(&self) -> f64 {
        match self {
            FetchProgressEvent::Started { .. } => 0.0,
            FetchProgressEvent::Fetched {
                completed, total, ..
            } => {
                if *total == 0 {
                    1.0
                } else {
                    *completed as f64 / *total as f64
                }
            }
        }
    }
}

/// Reports fetch progress. Implementations write to stderr (human or JSON).
pub trait FetchProgressReporter: Send + Sync {
    fn report(&self, event: FetchProgressEvent);
}

/// Human-friendly progress on stderr: "fetched 2 / 3 articles  https://...".
pub struct StderrProgress;

impl FetchProgressReporter for StderrProgress {
    fn report(&self, event: FetchProgressEvent) {
        let line = match &event {
            FetchProgressEvent::Started { total } => {
                format!("fetching {} article{}...\n", total, plural(*total))
            }
            FetchProgressEvent::Fetched {
                url,
                ok,
                completed,
                total,
            } => format!(
                "fetched {} / {} articles  {}{}\n",
                completed,
                total,
                url,
                if *ok { "" } else { "  (failed)" }
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl FetchProgressReporter for JsonProgress {
    fn report(&self, event: FetchProgressEvent) {
        let obj = match &event {
            FetchProgressEvent::Started { total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "total": total
            }),
            FetchProgressEvent::Fetched {
                url,
                ok,
                completed,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "fetched",
                "url": url,
                "ok": ok,
                "completed": completed,
                "total": total,
                "fraction": event.fraction()
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl FetchProgressReporter for NoProgress {
    fn report(&self, _event: FetchProgressEvent) {}
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Formats an integer with thousands separators (`1234567` → `"1,234,567"`).
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    pub fn reporter(&self) -> Box<dyn FetchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
