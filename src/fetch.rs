//! Web article fetching.
//!
//! [`WebFetcher::extract_url`] downloads one page and keeps the text of its
//! paragraph elements. Failures are returned as [`FetchError`] values so a
//! batch can show each URL's error inline without aborting its siblings.
//!
//! [`WebFetcher::fetch_all`] runs a batch as a bounded concurrent fan-out
//! and joins the results back in input order.

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::progress::{FetchProgressEvent, FetchProgressReporter};

/// Failure to fetch a single URL. Displays as `Error fetching <url>: <cause>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error fetching {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: String,
}

impl FetchError {
    fn new(url: &str, cause: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            cause: cause.into(),
        }
    }
}

/// Outcome of one URL within a batch.
#[derive(Debug, Clone)]
pub struct ArticleOutcome {
    pub url: String,
    pub result: Result<String, FetchError>,
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_paragraphs: usize,
    pub max_urls: usize,
    pub concurrency: usize,
}

impl From<&FetchConfig> for FetchOptions {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            max_paragraphs: config.max_paragraphs,
            max_urls: config.max_urls,
            concurrency: config.concurrency,
        }
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

pub struct WebFetcher {
    client: reqwest::Client,
    options: FetchOptions,
}

impl WebFetcher {
    pub fn new(options: FetchOptions) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .build()?;
        Ok(Self { client, options })
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetches `url` and returns the text of its first paragraphs, joined by newlines.
    ///
    /// Invalid URLs, transport errors, timeouts and non-2xx statuses all come
    /// back as `Err(FetchError)`.
    pub async fn extract_url(&self, url: &str) -> Result<String, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::new(url, e.to_string()))?;

        debug!(url = %url, "fetching article");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::new(url, describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(url, format!("HTTP {}", status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::new(url, describe_reqwest_error(&e)))?;

        Ok(paragraph_text(&html, self.options.max_paragraphs))
    }

    /// Fetches every URL with at most `concurrency` requests in flight.
    ///
    /// Outcomes are returned in input order regardless of completion order.
    /// `progress` receives one event per resolved URL, in completion order.
    pub async fn fetch_all(
        &self,
        urls: &[String],
        progress: &dyn FetchProgressReporter,
    ) -> Vec<ArticleOutcome> {
        let total = urls.len();
        let completed = AtomicUsize::new(0);
        progress.report(FetchProgressEvent::Started { total });

        stream::iter(urls)
            .map(|url| {
                let completed = &completed;
                async move {
                    let result = self.extract_url(url).await;
                    if let Err(e) = &result {
                        warn!(url = %url, cause = %e.cause, "article fetch failed");
                    }
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.report(FetchProgressEvent::Fetched {
                        url: url.clone(),
                        ok: result.is_ok(),
                        completed: done,
                        total,
                    });
                    ArticleOutcome {
                        url: url.clone(),
                        result,
                    }
                }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

/// Text of the first `max` `<p>` elements, in document order, joined by `\n`.
pub fn paragraph_text(html: &str, max: usize) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .take(max)
        .map(|p| p.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
