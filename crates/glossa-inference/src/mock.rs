//! Mock text processor for deterministic testing.
//!
//! Available to dependent crates through the `mock` feature.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use glossa_inference::mock::MockTextProcessor;
//!
//! let processor = MockTextProcessor::new()
//!     .with_content("explanation", &["grammar", "idiom"]);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use glossa_core::{
    Error, OperationContext, ProcessedContent, ProviderError, Result, TextProcessor,
};

use crate::parser::parse_processed_content;

/// What the mock does when called.
#[derive(Debug, Clone)]
enum MockReply {
    Content(ProcessedContent),
    /// Raw model output, run through the real response parser.
    Raw(String),
    Failure(ProviderError),
}

#[derive(Debug, Clone)]
struct MockConfig {
    provider: String,
    default_reply: MockReply,
    replies_by_text: HashMap<String, MockReply>,
    latency: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            default_reply: MockReply::Content(ProcessedContent {
                content: "Mock explanation".to_string(),
                tags: vec!["mock".to_string()],
            }),
            replies_by_text: HashMap::new(),
            latency: Duration::ZERO,
        }
    }
}

/// A recorded `process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
}

/// Mock [`TextProcessor`] returning canned replies.
#[derive(Clone, Default)]
pub struct MockTextProcessor {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

impl MockTextProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with the given content and tags.
    pub fn with_content(mut self, content: impl Into<String>, tags: &[&str]) -> Self {
        Arc::make_mut(&mut self.config).default_reply = MockReply::Content(ProcessedContent {
            content: content.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Reply with raw model output, parsed like a real provider reply.
    pub fn with_raw_reply(mut self, reply: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_reply = MockReply::Raw(reply.into());
        self
    }

    /// Fail every call with a provider error.
    pub fn with_failure(mut self, status: u16, message: impl Into<String>) -> Self {
        let provider = self.config.provider.clone();
        Arc::make_mut(&mut self.config).default_reply =
            MockReply::Failure(ProviderError::from_status(status, message, provider));
        self
    }

    /// Reply with specific content when called with exactly `text`.
    pub fn with_content_for(
        mut self,
        text: impl Into<String>,
        content: impl Into<String>,
        tags: &[&str],
    ) -> Self {
        Arc::make_mut(&mut self.config).replies_by_text.insert(
            text.into(),
            MockReply::Content(ProcessedContent {
                content: content.into(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }),
        );
        self
    }

    /// Delay every reply. The delay honours the caller's context.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        Arc::make_mut(&mut self.config).latency = latency;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).provider = provider.into();
        self
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn reply_for(&self, text: &str) -> &MockReply {
        self.config
            .replies_by_text
            .get(text)
            .unwrap_or(&self.config.default_reply)
    }
}

#[async_trait]
impl TextProcessor for MockTextProcessor {
    async fn process(
        &self,
        ctx: &OperationContext,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<ProcessedContent> {
        ctx.check()?;

        self.call_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MockCall {
                text: text.to_string(),
                source_language: source_language.to_string(),
                target_language: target_language.to_string(),
            });

        if !self.config.latency.is_zero() {
            tokio::select! {
                biased;
                err = ctx.cancelled() => return Err(err),
                _ = tokio::time::sleep(self.config.latency) => {}
            }
        }

        match self.reply_for(text) {
            MockReply::Content(content) => Ok(content.clone()),
            MockReply::Raw(reply) => parse_processed_content(reply),
            MockReply::Failure(err) => Err(Error::Provider(err.clone())),
        }
    }

    fn provider(&self) -> &str {
        &self.config.provider
    }
}
