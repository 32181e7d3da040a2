//! # glossa-core
//!
//! Core types, traits, and abstractions for the glossa note-enrichment
//! pipeline.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other glossa crates depend on: the note lifecycle, the queued task,
//! the repository/queue/processor seams, and the operation context used for
//! cancellation.

pub mod context;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use context::OperationContext;
pub use error::{Error, ProviderError, Result};
pub use models::*;
pub use traits::*;
