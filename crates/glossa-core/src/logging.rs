//! Structured logging field names for glossa.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Infrastructure failure, requires operator attention |
//! | WARN  | Recoverable issue (retry scheduled, task failed and recorded) |
//! | INFO  | Lifecycle events (startup, shutdown), task completions |
//! | DEBUG | Decision points, per-attempt details |
//! | TRACE | Raw payload sizes and similar high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "inference", "jobs", "db", "worker"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "client", "parser", "queue", "pool", "service"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process", "enqueue", "dequeue", "submit"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

/// Index of the worker loop handling a task.
pub const WORKER_ID: &str = "worker_id";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Provider name ("openai", "deepseek").
pub const PROVIDER: &str = "provider";

/// Model name used for generation.
pub const MODEL: &str = "model";

/// 1-based attempt number within a retried call.
pub const ATTEMPT: &str = "attempt";

/// HTTP status of a provider response.
pub const STATUS: &str = "status";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Backoff wait before the next attempt, in milliseconds.
pub const WAIT_MS: &str = "wait_ms";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Number of tags attached to a note.
pub const TAG_COUNT: &str = "tag_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
