//! # glossa-inference
//!
//! Text-generation client for the glossa note-enrichment pipeline.
//!
//! This crate provides:
//! - An OpenAI-compatible chat-completions client with cancellable retry
//! - Provider selection (OpenAI, DeepSeek) at construction time
//! - The lenient response parser that recovers `{content, tags}`
//! - Injected metrics sinks
//!
//! # Feature Flags
//!
//! - `mock`: Expose [`mock::MockTextProcessor`] to dependent crates' tests

pub mod metrics;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod retry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use metrics::{FacadeMetrics, InMemoryMetrics, NoopMetrics};
pub use openai::ChatCompletionClient;
pub use parser::parse_processed_content;
pub use provider::{create_processor, ProviderConfig, ProviderKind};
pub use retry::{with_retry, RetryConfig};
