//! Corpus statistics.
//!
//! Character and word counts for the loaded text, shown by `:stats` in the
//! chat loop after every load.

use serde::Serialize;

use crate::progress::format_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    /// Unicode scalar values, not bytes.
    pub char_count: usize,
    /// Whitespace-delimited tokens.
    pub word_count: usize,
}

impl CorpusStats {
    pub fn of(text: &str) -> Self {
        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
        }
    }

    /// Two-line summary, e.g. `"12,345 characters\n2,001 words"`.
    pub fn render(&self) -> String {
        format!(
            "{} characters\n{} words",
            format_number(self.char_count as u64),
            format_number(self.word_count as u64)
        )
    }
}
