//! OpenAI-compatible chat-completions client.
//!
//! Works with any endpoint that speaks the chat-completions dialect; the
//! OpenAI and DeepSeek defaults live in [`crate::provider`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glossa_core::{OperationContext, TextProcessor};
//! use glossa_inference::metrics::NoopMetrics;
//! use glossa_inference::openai::ChatCompletionClient;
//! use glossa_inference::provider::{ProviderConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProviderConfig::new(ProviderKind::DeepSeek, "sk-...");
//!     let client = ChatCompletionClient::new(config, Arc::new(NoopMetrics)).unwrap();
//!     let result = client
//!         .process(&OperationContext::new(), "Ich habe Hunger", "en", "de")
//!         .await
//!         .unwrap();
//!     println!("{}", result.content);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{ChatCompletionClient, CHAT_COMPLETIONS_PATH};
pub use error::extract_error_message;
pub use types::*;
