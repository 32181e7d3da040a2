//! Error types for glossa.

use thiserror::Error;

/// Result type alias using glossa's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by a text-generation provider for a non-2xx response
/// (or a per-call timeout, which is reported as HTTP 408).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} API error (HTTP {status}): {message}")]
pub struct ProviderError {
    /// HTTP status returned by the provider.
    pub status: u16,
    /// Message extracted from the provider's error body.
    pub message: String,
    /// Provider name ("openai", "deepseek", ...).
    pub provider: String,
    /// Whether the call may succeed if repeated.
    pub retryable: bool,
}

impl ProviderError {
    /// Create a provider error, classifying retryability from the status.
    ///
    /// Server errors (5xx) and rate limiting (429) are retryable; every
    /// other status is permanent.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            status,
            message: message.into(),
            provider: provider.into(),
            retryable: Self::is_retryable_status(status),
        }
    }

    /// Per-call deadline exceeded. Always retryable.
    pub fn timeout(provider: impl Into<String>) -> Self {
        Self {
            status: 408,
            message: "request timed out".to_string(),
            provider: provider.into(),
            retryable: true,
        }
    }

    /// Retryability rule for HTTP statuses.
    pub fn is_retryable_status(status: u16) -> bool {
        status >= 500 || status == 429
    }
}

/// Core error type for glossa operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Text-generation provider returned an error response
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Provider reply could not be turned into processed content
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider reply was well-formed JSON but unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP/network request failed before a response was received
    #[error("Request error: {0}")]
    Request(String),

    /// Task queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Illegal note status transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Forbidden (authenticated but not the owner)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Caller deadline expired before the operation finished
    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether repeating the operation could succeed.
    ///
    /// Only provider errors flagged retryable qualify; cancellation,
    /// parse failures and permanent provider errors never do.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(e) if e.retryable)
    }

    /// Whether this error came from the caller's context rather than the
    /// operation itself.
    pub fn is_context_error(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::Queue(e.to_string())
    }
}
