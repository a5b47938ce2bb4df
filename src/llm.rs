//! Hosted language-model clients.
//!
//! Two providers implement [`LanguageModel`]:
//! - **[`GeminiModel`]**: `POST /v1beta/models/{model}:generateContent`.
//! - **[`OpenAIModel`]**: `POST /v1/chat/completions`.
//!
//! Both send a single user turn containing the full prompt and return the
//! response text untouched. Every fault (transport, HTTP status, malformed
//! body, blocked prompt) is converted to a [`ModelFailure`] so callers never
//! see a raw `reqwest` error.
//!
//! # Failure classification
//!
//! | Kind | Retryable |
//! |------|-----------|
//! | `Transport` (connect, timeout, reset) | yes |
//! | `Status(429)`, `Status(5xx)` | yes |
//! | `Status(4xx)` | no |
//! | `Blocked`, `Malformed` | no |
//!
//! Whether a retryable failure is actually retried is decided by the
//! Q&A engine (`model.max_retries`, default 0).

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;
use crate::traits::LanguageModel;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Status(u16),
    Blocked(String),
    Malformed,
}

/// A failed model call, classified so callers can decide on retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ModelFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ModelFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Transport => true,
            FailureKind::Status(code) => code == 429 || (500..600).contains(&code),
            FailureKind::Blocked(_) | FailureKind::Malformed => false,
        }
    }
}

fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// Sends a JSON body and returns the decoded JSON reply, classifying every fault.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    provider: &str,
) -> Result<serde_json::Value, ModelFailure> {
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| ModelFailure::transport(format!("{} request failed: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(ModelFailure::new(
            FailureKind::Status(status.as_u16()),
            format!("{} API error {}: {}", provider, status, body_text.trim()),
        ));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ModelFailure::malformed(format!("{} returned invalid JSON: {}", provider, e)))
}

// ============ Gemini ============

pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: base_url(config, GEMINI_BASE_URL),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelFailure> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "calling Gemini");
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key);
        let json = post_json(request, &body, "Gemini").await?;
        parse_gemini_response(&json)
    }
}

/// Concatenates the text parts of the first candidate.
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<String, ModelFailure> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    let Some(candidate) = candidate else {
        if let Some(reason) = json
            .pointer("/promptFeedback/blockReason")
            .and_then(|r| r.as_str())
        {
            return Err(ModelFailure::new(
                FailureKind::Blocked(reason.to_string()),
                format!("Gemini blocked the prompt: {}", reason),
            ));
        }
        return Err(ModelFailure::malformed(
            "Invalid Gemini response: missing candidates",
        ));
    };

    let parts: Vec<&str> = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if parts.is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("UNKNOWN");
        return Err(ModelFailure::new(
            FailureKind::Blocked(reason.to_string()),
            format!("Gemini returned no text (finish reason: {})", reason),
        ));
    }

    Ok(parts.concat())
}

// ============ OpenAI ============

pub struct OpenAIModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAIModel {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: base_url(config, OPENAI_BASE_URL),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelFailure> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "calling OpenAI");
        let request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = post_json(request, &body, "OpenAI").await?;
        parse_openai_response(&json)
    }
}

pub fn parse_openai_response(json: &serde_json::Value) -> Result<String, ModelFailure> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .ok_or_else(|| ModelFailure::malformed("Invalid OpenAI response: missing message content"))
}

fn base_url(config: &ModelConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Builds the configured provider with an explicit API key.
pub fn build_model(config: &ModelConfig, api_key: String) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiModel::new(config, api_key)?)),
        "openai" => Ok(Arc::new(OpenAIModel::new(config, api_key)?)),
        other => bail!("Unknown model provider: {}", other),
    }
}

/// Builds the configured provider, reading the API key from `model.api_key_env`.
///
/// # Errors
///
/// Fails if the environment variable is unset or empty.
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
    if api_key.trim().is_empty() {
        bail!("{} environment variable not set", config.api_key_env);
    }
    build_model(config, api_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gemini_parts_are_concatenated() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Revenue " }, { "text": "grew." }] },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Revenue grew.");
    }

    #[test]
    fn gemini_block_reason_is_classified() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let failure = parse_gemini_response(&json).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Blocked("SAFETY".to_string()));
        assert!(!failure.is_retryable());
    }

    #[test]
    fn gemini_candidate_without_text_is_blocked() {
        let json = json!({ "candidates": [{ "finishReason": "RECITATION" }] });
        let failure = parse_gemini_response(&json).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Blocked("RECITATION".to_string()));
    }

    #[test]
    fn gemini_garbage_is_malformed() {
        let failure = parse_gemini_response(&json!({ "unexpected": true })).unwrap_err();
        assert_eq!(failure.kind, FailureKind::Malformed);
    }

    #[test]
    fn openai_content_is_extracted() {
        let json = json!({ "choices": [{ "message": { "role": "assistant", "content": "42" } }] });
        assert_eq!(parse_openai_response(&json).unwrap(), "42");
        assert!(parse_openai_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn retryable_classification() {
        assert!(ModelFailure::transport("reset").is_retryable());
        assert!(ModelFailure::new(FailureKind::Status(429), "slow down").is_retryable());
        assert!(ModelFailure::new(FailureKind::Status(503), "busy").is_retryable());
        assert!(!ModelFailure::new(FailureKind::Status(400), "bad").is_retryable());
        assert!(!ModelFailure::new(FailureKind::Status(401), "key").is_retryable());
        assert!(!ModelFailure::malformed("junk").is_retryable());
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let config = ModelConfig {
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(base_url(&config, GEMINI_BASE_URL), "http://127.0.0.1:9999");
        assert_eq!(
            base_url(&ModelConfig::default(), GEMINI_BASE_URL),
            GEMINI_BASE_URL
        );
    }

    #[test]
    fn missing_api_key_env_is_an_error() {
        let config = ModelConfig {
            api_key_env: "EQT_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ModelConfig::default()
        };
        let err = create_model(&config).err().unwrap();
        assert!(err.to_string().contains("EQT_TEST_KEY_THAT_IS_NEVER_SET"));
    }
}
