//! The loaded text corpus and the operations that replace it.
//!
//! A session holds exactly one [`Corpus`]. Every successful load replaces
//! text and source together; the only place several inputs are merged is a
//! web-article batch, which is composed first and committed once.

use std::path::Path;
use tracing::info;

use crate::extract::{extract_text, ExtractionError};
use crate::fetch::{ArticleOutcome, WebFetcher};
use crate::models::{ContentSource, DocumentKind};
use crate::progress::FetchProgressReporter;
use crate::stats::CorpusStats;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("no text could be extracted from {0}")]
    Empty(String),
    #[error("at most {max} URLs can be fetched at once, got {given}")]
    TooManyUrls { max: usize, given: usize },
    #[error("no URLs given")]
    NoUrls,
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

/// The text currently available for question answering, with its provenance.
///
/// `is_loaded()` is derived from the fields, so it can never disagree with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    text: String,
    source: Option<ContentSource>,
}

impl Corpus {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> Option<&ContentSource> {
        self.source.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        !self.text.is_empty() && self.source.is_some()
    }
}

/// Result of a web-article batch: one outcome per URL, in input order.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub outcomes: Vec<ArticleOutcome>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

#[derive(Debug, Default)]
pub struct CorpusManager {
    corpus: Corpus,
}

impl CorpusManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Extracts `bytes` as `kind` and replaces the corpus with the result.
    ///
    /// Whitespace-only extractions leave the current corpus untouched.
    pub fn load_document(
        &mut self,
        kind: DocumentKind,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), CorpusError> {
        let text = extract_text(kind, bytes)?;
        if text.trim().is_empty() {
            return Err(CorpusError::Empty(name.to_string()));
        }

        info!(kind = kind.label(), document = name, chars = text.len(), "document loaded");
        self.replace(
            text,
            ContentSource::Document {
                kind,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Reads a file from disk, inferring its kind from the extension.
    pub fn load_path(&mut self, path: &Path) -> Result<ContentSource, CorpusError> {
        let kind = DocumentKind::from_path(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.load_document(kind, &name, &bytes)?;
        Ok(ContentSource::Document { kind, name })
    }

    /// Fetches every URL and commits their concatenated blocks as one corpus.
    ///
    /// A failing URL never aborts the batch: its error text becomes that
    /// article's block so the model sees the failure rather than a gap.
    pub async fn load_web_articles(
        &mut self,
        fetcher: &WebFetcher,
        urls: &[String],
        progress: &dyn FetchProgressReporter,
    ) -> Result<BatchResult, CorpusError> {
        if urls.is_empty() {
            return Err(CorpusError::NoUrls);
        }
        let max = fetcher.options().max_urls;
        if urls.len() > max {
            return Err(CorpusError::TooManyUrls {
                max,
                given: urls.len(),
            });
        }

        let outcomes = fetcher.fetch_all(urls, progress).await;
        let text = compose_articles(&outcomes);
        let batch = BatchResult { outcomes };

        info!(
            urls = urls.len(),
            failed = batch.failed(),
            "web articles loaded"
        );
        self.replace(
            text,
            ContentSource::WebArticles {
                urls: urls.to_vec(),
            },
        );
        Ok(batch)
    }

    /// Replaces the corpus with `text` as-is. Callers reject empty input.
    pub fn load_direct_text(&mut self, text: &str) {
        self.replace(
            text.to_string(),
            ContentSource::DirectText {
                length: text.chars().count(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.corpus = Corpus::empty();
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats::of(&self.corpus.text)
    }

    fn replace(&mut self, text: String, source: ContentSource) {
        self.corpus = Corpus {
            text,
            source: Some(source),
        };
    }
}

/// Header line that introduces article `index` (1-based) in a batch corpus.
pub fn article_header(index: usize, url: &str) -> String {
    format!("\n\n--- Article {} from {} ---\n\n", index, url)
}

/// Concatenates per-article blocks in input order; failures appear inline.
pub fn compose_articles(outcomes: &[ArticleOutcome]) -> String {
    let mut text = String::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        text.push_str(&article_header(i + 1, &outcome.url));
        match &outcome.result {
            Ok(body) => text.push_str(body),
            Err(e) => text.push_str(&e.to_string()),
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;

    #[test]
    fn new_corpus_is_not_loaded() {
        let manager = CorpusManager::new();
        assert!(!manager.corpus().is_loaded());
        assert!(manager.corpus().source().is_none());
        assert_eq!(manager.stats().word_count, 0);
    }

    #[test]
    fn direct_text_round_trips() {
        let mut manager = CorpusManager::new();
        let text = "  Revenue grew 12%\n\nMargins  fell. ";
        manager.load_direct_text(text);
        assert_eq!(manager.corpus().text(), text);
        assert!(manager.corpus().is_loaded());
        assert_eq!(
            manager.corpus().source(),
            Some(&ContentSource::DirectText {
                length: text.chars().count()
            })
        );
    }

    #[test]
    fn empty_direct_text_is_not_loaded() {
        let mut manager = CorpusManager::new();
        manager.load_direct_text("");
        assert!(!manager.corpus().is_loaded());
    }

    #[test]
    fn loading_replaces_previous_content() {
        let mut manager = CorpusManager::new();
        manager.load_direct_text("first");
        manager
            .load_document(DocumentKind::Txt, "notes.txt", b"second")
            .unwrap();
        assert_eq!(manager.corpus().text(), "second");
        assert_eq!(
            manager.corpus().source(),
            Some(&ContentSource::Document {
                kind: DocumentKind::Txt,
                name: "notes.txt".to_string()
            })
        );
    }

    #[test]
    fn failed_extraction_keeps_previous_corpus() {
        let mut manager = CorpusManager::new();
        manager.load_direct_text("keep me");
        let err = manager
            .load_document(DocumentKind::Txt, "bad.txt", &[0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(
            err,
            CorpusError::Extraction(ExtractionError::Encoding(_))
        ));
        assert_eq!(manager.corpus().text(), "keep me");
    }

    #[test]
    fn blank_document_is_rejected() {
        let mut manager = CorpusManager::new();
        let err = manager
            .load_document(DocumentKind::Txt, "blank.txt", b" \n ")
            .unwrap_err();
        assert!(matches!(err, CorpusError::Empty(name) if name == "blank.txt"));
        assert!(!manager.corpus().is_loaded());
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut manager = CorpusManager::new();
        manager.load_direct_text("something");
        manager.clear();
        assert_eq!(manager.corpus(), &Corpus::empty());
    }

    #[test]
    fn compose_keeps_input_order_and_inlines_errors() {
        let outcomes = vec![
            ArticleOutcome {
                url: "https://a.example".to_string(),
                result: Ok("alpha body".to_string()),
            },
            ArticleOutcome {
                url: "https://b.example".to_string(),
                result: Err(FetchError {
                    url: "https://b.example".to_string(),
                    cause: "HTTP 500 Internal Server Error".to_string(),
                }),
            },
            ArticleOutcome {
                url: "https://c.example".to_string(),
                result: Ok("gamma body".to_string()),
            },
        ];
        let text = compose_articles(&outcomes);
        assert_eq!(
            text,
            "\n\n--- Article 1 from https://a.example ---\n\nalpha body\
             \n\n--- Article 2 from https://b.example ---\n\n\
             Error fetching https://b.example: HTTP 500 Internal Server Error\
             \n\n--- Article 3 from https://c.example ---\n\ngamma body"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut manager = CorpusManager::new();
        let err = manager
            .load_path(Path::new("/definitely/not/here.txt"))
            .unwrap_err();
        assert!(matches!(err, CorpusError::Io(_)));
    }
}
