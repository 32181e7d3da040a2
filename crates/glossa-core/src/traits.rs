//! Core traits for glossa abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::OperationContext;
use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for note persistence.
///
/// Updates are whole-row replacements, tag set included. Tags are
/// deduplicated by name in the store.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note.
    async fn create(&self, note: Note) -> Result<Note>;

    /// Fetch a note by ID. Missing notes yield `Error::NoteNotFound`.
    async fn get(&self, id: Uuid) -> Result<Note>;

    /// Replace a stored note (status, content, error message, tags).
    async fn update(&self, note: Note) -> Result<Note>;

    /// Atomically move a pending note to processing.
    ///
    /// Returns `None` when the note is missing or no longer pending, so
    /// only one caller can claim a note.
    async fn claim_pending(&self, id: Uuid) -> Result<Option<Note>>;

    /// All notes owned by a user, newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Note>>;

    /// Permanently delete a note.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// USER DIRECTORY TRAITS
// =============================================================================

/// Read access to users' language preferences.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by ID. Missing users yield `Error::UserNotFound`.
    async fn get_by_id(&self, id: Uuid) -> Result<User>;
}

// =============================================================================
// TASK QUEUE TRAITS
// =============================================================================

/// Durable FIFO handoff between producers and the worker pool.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Append a task to the tail. Returns once the append is acknowledged.
    async fn enqueue(&self, task: &Task) -> Result<()>;

    /// Remove and return the oldest task, waiting until one is available
    /// or the context ends.
    ///
    /// When the context ends first, no item is consumed.
    async fn dequeue(&self, ctx: &OperationContext) -> Result<Task>;

    /// Number of queued tasks.
    async fn len(&self) -> Result<usize>;
}

// =============================================================================
// TEXT PROCESSING TRAITS
// =============================================================================

/// A text-generation provider turned into a note enricher.
#[async_trait]
pub trait TextProcessor: Send + Sync {
    /// Explain `text` for a speaker of `source_language` learning
    /// `target_language`.
    async fn process(
        &self,
        ctx: &OperationContext,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<ProcessedContent>;

    /// Provider name used in logs and metric labels.
    fn provider(&self) -> &str;
}

// =============================================================================
// OBSERVABILITY TRAITS
// =============================================================================

/// Outcome label for a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    Success,
    Error,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for per-call provider observations, injected at construction.
pub trait MetricsSink: Send + Sync {
    /// Record one complete (possibly retried) provider call.
    fn record_request(&self, provider: &str, outcome: RequestOutcome, duration: Duration);
}
