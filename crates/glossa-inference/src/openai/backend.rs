//! Chat-completions client with retry, metrics and reply parsing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, trace, warn};

use glossa_core::{
    Error, MetricsSink, OperationContext, ProcessedContent, ProviderError, RequestOutcome, Result,
    TextProcessor,
};

use super::error::extract_error_message;
use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::parser::parse_processed_content;
use crate::prompt::enrichment_messages;
use crate::provider::ProviderConfig;
use crate::retry::{with_retry, RetryConfig};

/// Endpoint appended to the provider base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Text processor backed by an OpenAI-compatible chat-completions API.
///
/// One instance serves one provider. Every [`TextProcessor::process`] call
/// is retried per the configured [`RetryConfig`] and recorded exactly once
/// in the injected [`MetricsSink`], whatever the outcome.
pub struct ChatCompletionClient {
    client: Client,
    provider: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    retry: RetryConfig,
    metrics: Arc<dyn MetricsSink>,
}

impl ChatCompletionClient {
    /// Create a client for the provider described by `config`.
    pub fn new(config: ProviderConfig, metrics: Arc<dyn MetricsSink>) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} API key is required",
                config.kind.display_name()
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.resolved_base_url().trim_end_matches('/').to_string();
        let model = config.resolved_model().to_string();

        info!(
            subsystem = "inference",
            component = "client",
            provider = config.kind.name(),
            model = %model,
            base_url = %base_url,
            timeout_secs = config.timeout.as_secs(),
            max_retries = config.retry.max_retries,
            "Initializing chat-completions client"
        );

        Ok(Self {
            client,
            provider: config.kind.name(),
            base_url,
            api_key: config.api_key,
            model,
            timeout: config.timeout,
            retry: config.retry,
            metrics,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Per-call HTTP timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build an authenticated POST request.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        self.client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    /// Classify a transport failure. Timeouts are retryable provider errors;
    /// anything else never reached the provider.
    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            ProviderError::timeout(self.provider).into()
        } else {
            Error::Request(e.to_string())
        }
    }

    /// One HTTP round-trip. Returns the text of the first choice.
    async fn send_once(&self, request: &ChatCompletionRequest, attempt: u32) -> Result<String> {
        debug!(attempt, model = %self.model, "Sending chat completion request");

        let response = self
            .build_request(CHAT_COMPLETIONS_PATH)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let message = extract_error_message(&body);
            return Err(ProviderError::from_status(status.as_u16(), message, self.provider).into());
        }

        let completion: ChatCompletionResponse = serde_json::from_slice(&body)?;
        let reply = completion
            .into_first_content()
            .ok_or_else(|| Error::InvalidResponse("no choices in provider response".to_string()))?;

        trace!(attempt, response_len = reply.len(), "Received chat completion");
        Ok(reply)
    }

    async fn run(
        &self,
        ctx: &OperationContext,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<ProcessedContent> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: enrichment_messages(text, source_language, target_language),
        };

        let reply =
            with_retry(ctx, &self.retry, |attempt| self.send_once(&request, attempt)).await?;
        parse_processed_content(&reply)
    }
}

#[async_trait]
impl TextProcessor for ChatCompletionClient {
    #[instrument(
        skip(self, ctx, text),
        fields(
            subsystem = "inference",
            component = "client",
            op = "process",
            provider = self.provider,
            model = %self.model,
            text_len = text.len()
        )
    )]
    async fn process(
        &self,
        ctx: &OperationContext,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<ProcessedContent> {
        let start = Instant::now();
        let result = self.run(ctx, text, source_language, target_language).await;
        let elapsed = start.elapsed();

        let outcome = if result.is_ok() {
            RequestOutcome::Success
        } else {
            RequestOutcome::Error
        };
        self.metrics.record_request(self.provider, outcome, elapsed);

        match &result {
            Ok(processed) => info!(
                duration_ms = elapsed.as_millis() as u64,
                tag_count = processed.tags.len(),
                "Text processed"
            ),
            Err(e) if e.is_context_error() => debug!(
                duration_ms = elapsed.as_millis() as u64,
                error = %e,
                "Text processing interrupted by caller"
            ),
            Err(e) => warn!(
                duration_ms = elapsed.as_millis() as u64,
                error = %e,
                "Text processing failed"
            ),
        }

        result
    }

    fn provider(&self) -> &str {
        self.provider
    }
}
