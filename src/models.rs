//! Core data models used throughout EquityTool.
//!
//! These types describe where loaded content came from and the messages
//! exchanged during a session.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::extract::ExtractionError;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_CSV: &str = "text/csv";
pub const MIME_TXT: &str = "text/plain";

/// File formats accepted for document ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Csv,
    Txt,
}

impl DocumentKind {
    /// Infers the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "csv" => Ok(DocumentKind::Csv),
            "txt" => Ok(DocumentKind::Txt),
            _ => Err(ExtractionError::Unsupported(path.display().to_string())),
        }
    }

    pub fn from_mime(content_type: &str) -> Result<Self, ExtractionError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Ok(DocumentKind::Pdf),
            MIME_CSV => Ok(DocumentKind::Csv),
            MIME_TXT => Ok(DocumentKind::Txt),
            _ => Err(ExtractionError::Unsupported(content_type.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "PDF",
            DocumentKind::Csv => "CSV",
            DocumentKind::Txt => "TXT",
        }
    }
}

/// Provenance of the text currently loaded as the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSource {
    Document { kind: DocumentKind, name: String },
    WebArticles { urls: Vec<String> },
    DirectText { length: usize },
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Document { kind, name } => write!(f, "{}: {}", kind.label(), name),
            ContentSource::WebArticles { urls } => {
                write!(f, "Web Articles: {} articles loaded", urls.len())
            }
            ContentSource::DirectText { length } => write!(f, "Direct input ({} chars)", length),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension_ignores_case() {
        assert_eq!(
            DocumentKind::from_path(Path::new("report.PDF")).unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("data/prices.csv")).unwrap(),
            DocumentKind::Csv
        );
        assert!(matches!(
            DocumentKind::from_path(Path::new("slides.pptx")),
            Err(ExtractionError::Unsupported(_))
        ));
    }

    #[test]
    fn kind_from_mime_strips_parameters() {
        assert_eq!(
            DocumentKind::from_mime("text/plain; charset=utf-8").unwrap(),
            DocumentKind::Txt
        );
        assert!(DocumentKind::from_mime("image/png").is_err());
    }

    #[test]
    fn source_labels() {
        let doc = ContentSource::Document {
            kind: DocumentKind::Csv,
            name: "q3.csv".to_string(),
        };
        assert_eq!(doc.to_string(), "CSV: q3.csv");
        let web = ContentSource::WebArticles {
            urls: vec!["https://a".into(), "https://b".into()],
        };
        assert_eq!(web.to_string(), "Web Articles: 2 articles loaded");
        assert_eq!(
            ContentSource::DirectText { length: 42 }.to_string(),
            "Direct input (42 chars)"
        );
    }
}
