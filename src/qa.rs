//! Grounded question answering.
//!
//! [`QaEngine::ask`] embeds the entire corpus in a single prompt together
//! with the question and sends it to a [`LanguageModel`]. Nothing is
//! truncated, chunked or cached: every question resends the full corpus.
//!
//! ```text
//! You are a helpful research assistant called EquityTool.
//! Use the following content to answer the question in English only, clearly and concisely.
//!
//! Content:
//! """
//! <corpus text>
//! """
//!
//! Question: <question>
//! Answer in English:
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::Corpus;
use crate::llm::ModelFailure;
use crate::traits::LanguageModel;

#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("no content loaded; load a document, web articles or text first")]
    NoContent,
    #[error("model request failed: {0}")]
    ModelFailure(#[from] ModelFailure),
}

pub struct QaEngine {
    model: Arc<dyn LanguageModel>,
    assistant_name: String,
    max_retries: u32,
    retry_base: Duration,
    detect_language: bool,
}

impl QaEngine {
    pub fn new(model: Arc<dyn LanguageModel>, assistant_name: impl Into<String>) -> Self {
        Self {
            model,
            assistant_name: assistant_name.into(),
            max_retries: 0,
            retry_base: Duration::from_secs(1),
            detect_language: false,
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &Config) -> Self {
        Self::new(model, config.assistant.name.clone())
            .with_max_retries(config.model.max_retries)
            .with_language_detection(config.assistant.detect_language)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// First backoff delay; later retries double it (capped at 32×).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn with_language_detection(mut self, enabled: bool) -> Self {
        self.detect_language = enabled;
        self
    }

    pub fn assistant_name(&self) -> &str {
        &self.assistant_name
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    pub fn build_prompt(&self, corpus_text: &str, question: &str) -> String {
        format!(
            "You are a helpful research assistant called {name}.\n\
             Use the following content to answer the question in English only, clearly and concisely.\n\
             \n\
             Content:\n\
             \"\"\"\n\
             {corpus}\n\
             \"\"\"\n\
             \n\
             Question: {question}\n\
             Answer in English:\n",
            name = self.assistant_name,
            corpus = corpus_text,
            question = question,
        )
    }

    /// Answers `question` from `corpus`.
    ///
    /// Returns [`QaError::NoContent`] without contacting the model when the
    /// corpus is not loaded. Retryable model failures are retried only when
    /// `max_retries > 0`.
    pub async fn ask(&self, corpus: &Corpus, question: &str) -> Result<String, QaError> {
        if !corpus.is_loaded() {
            return Err(QaError::NoContent);
        }

        if self.detect_language {
            info!(language = %detect_language(question), "question language");
        }

        let prompt = self.build_prompt(corpus.text(), question);
        info!(
            model = self.model.model_name(),
            prompt_chars = prompt.len(),
            "asking model"
        );

        let mut attempt = 0u32;
        loop {
            match self.model.generate(&prompt).await {
                Ok(answer) => return Ok(answer),
                Err(failure) if failure.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_base * (1u32 << (attempt - 1).min(5));
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => {
                    warn!(error = %failure, "model call failed");
                    return Err(QaError::ModelFailure(failure));
                }
            }
        }
    }
}

/// Best-effort language of `text` as an ISO 639-1 code where one is known
/// (ISO 639-3 otherwise). Falls back to `"en"` when detection is unreliable.
pub fn detect_language(text: &str) -> String {
    use whatlang::Lang;

    let Some(info) = whatlang::detect(text) else {
        return "en".to_string();
    };
    if !info.is_reliable() {
        return "en".to_string();
    }

    let code = match info.lang() {
        Lang::Eng => "en",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Pol => "pl",
        Lang::Swe => "sv",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        other => other.code(),
    };
    code.to_string()
}
