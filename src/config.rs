use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's public endpoint (proxies, local gateways).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// No request timeout is applied when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: None,
            max_retries: 0,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_paragraphs")]
    pub max_paragraphs: usize,
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            max_paragraphs: default_max_paragraphs(),
            max_urls: default_max_urls(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_max_paragraphs() -> usize {
    50
}
fn default_max_urls() -> usize {
    3
}
fn default_concurrency() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
    /// Log the detected language of each question. Never changes the prompt.
    #[serde(default)]
    pub detect_language: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            detect_language: false,
        }
    }
}

fn default_assistant_name() -> String {
    "EquityTool".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_unicode_font")]
    pub unicode_font: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            unicode_font: default_unicode_font(),
        }
    }
}

fn default_unicode_font() -> PathBuf {
    PathBuf::from("NotoSans-Regular.ttf")
}

impl Config {
    /// Configuration with every section defaulted and the database under `./data`.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/eqt.sqlite"),
            },
            model: ModelConfig::default(),
            fetch: FetchConfig::default(),
            assistant: AssistantConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be > 0");
    }
    if config.fetch.max_urls == 0 {
        anyhow::bail!("fetch.max_urls must be >= 1");
    }
    if config.fetch.concurrency == 0 {
        anyhow::bail!("fetch.concurrency must be >= 1");
    }
    if config.fetch.max_paragraphs == 0 {
        anyhow::bail!("fetch.max_paragraphs must be > 0");
    }
    if config.model.timeout_secs == Some(0) {
        anyhow::bail!("model.timeout_secs must be > 0 when set");
    }
    if config.assistant.name.trim().is_empty() {
        anyhow::bail!("assistant.name must not be empty");
    }

    match config.model.provider.as_str() {
        "gemini" | "openai" => {}
        other => anyhow::bail!(
            "Unknown model provider: '{}'. Must be gemini or openai.",
            other
        ),
    }

    Ok(())
}
