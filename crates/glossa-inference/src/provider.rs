//! Text-generation provider selection.
//!
//! Both supported vendors speak the OpenAI chat-completions dialect, so a
//! provider is a [`ProviderKind`] plus endpoint defaults. The choice is made
//! once, at construction, by [`create_processor`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use glossa_core::{defaults, Error, MetricsSink, Result, TextProcessor};

use crate::openai::ChatCompletionClient;
use crate::retry::RetryConfig;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default OpenAI generation model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";

/// Default DeepSeek API endpoint.
pub const DEFAULT_DEEPSEEK_URL: &str = "https://api.deepseek.com/v1";

/// Default DeepSeek generation model.
pub const DEFAULT_DEEPSEEK_MODEL: &str = "deepseek-chat";

/// Supported text-generation vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "deepseek")]
    DeepSeek,
}

impl ProviderKind {
    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::DeepSeek => "deepseek",
        }
    }

    /// Human-facing vendor name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::DeepSeek => "DeepSeek",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_URL,
            Self::DeepSeek => DEFAULT_DEEPSEEK_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_MODEL,
            Self::DeepSeek => DEFAULT_DEEPSEEK_MODEL,
        }
    }

    /// Environment variable holding this vendor's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "deepseek" => Ok(Self::DeepSeek),
            other => Err(Error::Config(format!("unsupported LLM provider: {}", other))),
        }
    }
}

/// Configuration for one provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: String,
    /// Overrides the vendor's default model.
    pub model: Option<String>,
    /// Overrides the vendor's default endpoint.
    pub base_url: Option<String>,
    /// Per-call HTTP timeout.
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: api_key.into(),
            model: None,
            base_url: None,
            timeout: Duration::from_secs(defaults::LLM_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LLM_PROVIDER` | `deepseek` | `openai` or `deepseek` |
    /// | `OPENAI_API_KEY` | | Key used when the provider is `openai` |
    /// | `DEEPSEEK_API_KEY` | | Key used when the provider is `deepseek` |
    /// | `LLM_MODEL` | vendor default | Model override |
    /// | `LLM_BASE_URL` | vendor default | Endpoint override |
    /// | `LLM_TIMEOUT_SECS` | `30` | Per-call HTTP timeout |
    ///
    /// Retry settings come from [`RetryConfig::from_env`]. A missing key is
    /// not an error here; [`create_processor`] rejects it.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.retry = RetryConfig::from_env();
        Ok(config)
    }

    /// Build from an arbitrary variable lookup. Retry settings stay at
    /// their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind: ProviderKind = lookup("LLM_PROVIDER")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::LLM_PROVIDER.to_string())
            .parse()?;

        let mut config = Self::new(kind, lookup(kind.api_key_var()).unwrap_or_default());
        config.model = lookup("LLM_MODEL").filter(|v| !v.is_empty());
        config.base_url = lookup("LLM_BASE_URL").filter(|v| !v.is_empty());
        if let Some(secs) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Model actually sent to the provider.
    pub fn resolved_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.kind.default_model())
    }

    /// Endpoint actually called.
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

/// Build the processor selected by `config`.
pub fn create_processor(
    config: ProviderConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Arc<dyn TextProcessor>> {
    let kind = config.kind;
    let client = ChatCompletionClient::new(config, metrics)?;
    info!(
        subsystem = "inference",
        provider = kind.name(),
        model = client.model(),
        "Text processor ready"
    );
    Ok(Arc::new(client))
}
