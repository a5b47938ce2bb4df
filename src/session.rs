//! One user's working state: identity, corpus, conversation and model.
//!
//! A [`Session`] is an ordinary owned value. The CLI creates one per login
//! and drops it on exit; nothing here is global or shared between users.
//!
//! Every load, clear and question leaves a trace in the conversation log so
//! the transcript reads the same way the interactive session did.

use std::path::Path;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::conversation::ConversationLog;
use crate::corpus::{BatchResult, Corpus, CorpusError, CorpusManager};
use crate::fetch::{FetchOptions, WebFetcher};
use crate::models::{ContentSource, DocumentKind, Message, Role};
use crate::progress::FetchProgressReporter;
use crate::qa::{QaEngine, QaError};
use crate::stats::CorpusStats;

pub const NO_CONTENT_NOTICE: &str = "Please load some content first!";
pub const CLEARED_NOTICE: &str = "Content cleared. Please load new content to continue.";

pub struct Session {
    id: Uuid,
    username: String,
    corpus: CorpusManager,
    log: ConversationLog,
    engine: QaEngine,
    fetcher: WebFetcher,
}

impl Session {
    pub fn new(
        username: impl Into<String>,
        engine: QaEngine,
        fetch_options: FetchOptions,
    ) -> anyhow::Result<Self> {
        let mut session = Self {
            id: Uuid::new_v4(),
            username: username.into(),
            corpus: CorpusManager::new(),
            log: ConversationLog::new(),
            engine,
            fetcher: WebFetcher::new(fetch_options)?,
        };
        session.welcome();
        info!(session = %session.id, user = %session.username, "session started");
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn assistant_name(&self) -> &str {
        self.engine.assistant_name()
    }

    pub fn corpus(&self) -> &Corpus {
        self.corpus.corpus()
    }

    pub fn messages(&self) -> &[Message] {
        self.log.all()
    }

    pub fn stats(&self) -> CorpusStats {
        self.corpus.stats()
    }

    pub fn load_document(
        &mut self,
        kind: DocumentKind,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), CorpusError> {
        self.corpus.load_document(kind, name, bytes)?;
        self.announce_loaded();
        Ok(())
    }

    pub fn load_path(&mut self, path: &Path) -> Result<ContentSource, CorpusError> {
        let source = self.corpus.load_path(path)?;
        self.announce_loaded();
        Ok(source)
    }

    pub async fn load_web_articles(
        &mut self,
        urls: &[String],
        progress: &dyn FetchProgressReporter,
    ) -> Result<BatchResult, CorpusError> {
        let span = info_span!("web_batch", session = %self.id, urls = urls.len());
        let batch = self
            .corpus
            .load_web_articles(&self.fetcher, urls, progress)
            .instrument(span)
            .await?;
        self.announce_loaded();
        Ok(batch)
    }

    /// Loads pasted text. Blank input is rejected and the corpus kept.
    pub fn load_direct_text(&mut self, text: &str) -> Result<(), CorpusError> {
        if text.trim().is_empty() {
            return Err(CorpusError::Empty("direct text".to_string()));
        }
        self.corpus.load_direct_text(text);
        self.announce_loaded();
        Ok(())
    }

    pub fn clear_content(&mut self) {
        self.corpus.clear();
        self.log.append(Role::System, CLEARED_NOTICE);
    }

    /// Asks `question` against the current corpus.
    ///
    /// With nothing loaded, a notice is logged and the question is not.
    /// The answer is logged only when the model call succeeds.
    pub async fn ask(&mut self, question: &str) -> Result<String, QaError> {
        if !self.corpus.corpus().is_loaded() {
            self.log.append(Role::System, NO_CONTENT_NOTICE);
            return Err(QaError::NoContent);
        }

        self.log.append(Role::User, question);
        let span = info_span!("ask", session = %self.id);
        let answer = self
            .engine
            .ask(self.corpus.corpus(), question)
            .instrument(span)
            .await?;
        self.log.append(Role::Assistant, answer.clone());
        Ok(answer)
    }

    /// Drops the corpus and the whole conversation, then greets again.
    pub fn reset(&mut self) {
        self.corpus.clear();
        self.log.clear();
        self.welcome();
        info!(session = %self.id, "session reset");
    }

    fn welcome(&mut self) {
        let message = format!(
            "👋 Hello! I'm {}, your research assistant. Load a document, some web \
             articles or text, and I'll help you analyze and answer questions about it.",
            self.engine.assistant_name()
        );
        self.log.append(Role::Assistant, message);
    }

    fn announce_loaded(&mut self) {
        if let Some(source) = self.corpus.corpus().source() {
            let notice = format!(
                "Content loaded from: {}. You can now ask questions about it.",
                source
            );
            self.log.append(Role::System, notice);
        }
    }
}
