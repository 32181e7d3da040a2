//! Worker pool driving queued tasks to a terminal note state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use glossa_core::{
    defaults, Error, NoteRepository, OperationContext, Result, Task, TaskQueue, TextProcessor,
};

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Number of independent worker loops.
    pub worker_count: usize,
    /// Bound on a single dequeue wait.
    pub dequeue_timeout: Duration,
    /// Bound on the provider call for one task.
    pub process_timeout: Duration,
    /// Pause after a failed dequeue before trying again.
    pub error_backoff: Duration,
    /// Whether to start any workers at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::WORKER_COUNT,
            dequeue_timeout: Duration::from_secs(defaults::WORKER_DEQUEUE_TIMEOUT_SECS),
            process_timeout: Duration::from_secs(defaults::WORKER_PROCESS_TIMEOUT_SECS),
            error_backoff: Duration::from_millis(defaults::WORKER_ERROR_BACKOFF_MS),
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_ENABLED` | `true` | Enable/disable task processing |
    /// | `WORKER_COUNT` | `3` | Number of worker loops |
    /// | `WORKER_DEQUEUE_TIMEOUT_SECS` | `300` | Bound on one dequeue wait |
    /// | `WORKER_PROCESS_TIMEOUT_SECS` | `180` | Bound on one provider call |
    /// | `WORKER_ERROR_BACKOFF_MS` | `1000` | Pause after a dequeue error |
    pub fn from_env() -> Self {
        let default = Self::default();

        let enabled = std::env::var("WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let worker_count = std::env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(default.worker_count)
            .max(1);

        let dequeue_timeout = std::env::var("WORKER_DEQUEUE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.dequeue_timeout);

        let process_timeout = std::env::var("WORKER_PROCESS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.process_timeout);

        let error_backoff = std::env::var("WORKER_ERROR_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(default.error_backoff);

        Self {
            worker_count,
            dequeue_timeout,
            process_timeout,
            error_backoff,
            enabled,
        }
    }

    /// Set the number of worker loops (at least one).
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.process_timeout = timeout;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Enable or disable task processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A worker loop started.
    WorkerStarted { worker_id: usize },
    /// A task was dequeued and processing began.
    TaskStarted { note_id: Uuid },
    /// The note reached `Completed`.
    TaskCompleted { note_id: Uuid, tag_count: usize },
    /// The note reached `Failed`, or could not be persisted.
    TaskFailed { note_id: Uuid, error: String },
    /// The task was dropped without touching a note.
    TaskAbandoned { note_id: Uuid },
    /// A worker loop exited.
    WorkerStopped { worker_id: usize },
}

/// Result of driving one task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed { tag_count: usize },
    /// The note was marked failed with this message.
    Failed { error: String },
    /// The note is gone or no longer pending.
    Abandoned,
}

/// Message recorded on a note whose enrichment failed.
pub fn failure_message(cause: impl std::fmt::Display) -> String {
    format!("Failed to process text: {}", cause)
}

/// Drive one task to a terminal note state.
///
/// 1. Claim the note, moving it `Pending` to `Processing` in one store
///    call. A missing or already claimed note abandons the task, so a
///    duplicate task never reprocesses a note.
/// 2. Call the processor, bounded by `process_timeout`.
/// 3. A processor error or empty content marks the note `Failed`;
///    otherwise it becomes `Completed` with one tag per returned name.
///
/// `Err` is returned only when the store itself fails.
#[instrument(
    skip(notes, processor, task),
    fields(subsystem = "jobs", component = "worker", op = "process_task", note_id = %task.note_id)
)]
pub async fn process_task(
    notes: &dyn NoteRepository,
    processor: &dyn TextProcessor,
    task: &Task,
    process_timeout: Duration,
) -> Result<TaskOutcome> {
    let Some(mut note) = notes.claim_pending(task.note_id).await? else {
        warn!("Note is missing or no longer pending, abandoning task");
        return Ok(TaskOutcome::Abandoned);
    };

    let ctx = OperationContext::with_timeout(process_timeout);
    let result = processor
        .process(
            &ctx,
            &task.original_text,
            &task.native_language,
            &task.target_language,
        )
        .await;

    let outcome = match result {
        Ok(processed) if processed.content.is_empty() => {
            let error = failure_message("provider returned empty content");
            note.fail(error.clone())?;
            TaskOutcome::Failed { error }
        }
        Ok(processed) => {
            note.complete(processed.content, processed.tags)?;
            TaskOutcome::Completed {
                tag_count: note.tags.len(),
            }
        }
        Err(e) => {
            let error = failure_message(&e);
            note.fail(error.clone())?;
            TaskOutcome::Failed { error }
        }
    };

    notes.update(note).await?;
    Ok(outcome)
}

/// Collaborators shared by every worker loop.
struct PoolShared {
    queue: Arc<dyn TaskQueue>,
    notes: Arc<dyn NoteRepository>,
    processor: Arc<dyn TextProcessor>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl PoolShared {
    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    async fn run_worker(self: Arc<Self>, worker_id: usize, shutdown: CancellationToken) {
        info!(
            subsystem = "jobs",
            component = "worker",
            worker_id,
            "Worker started"
        );
        self.emit(WorkerEvent::WorkerStarted { worker_id });

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let ctx = OperationContext::with_token(shutdown.child_token())
                .timeout(self.config.dequeue_timeout);

            match self.queue.dequeue(&ctx).await {
                Ok(task) => self.handle_task(worker_id, task).await,
                Err(_) if shutdown.is_cancelled() => break,
                Err(e) => {
                    if matches!(e, Error::DeadlineExceeded) {
                        debug!(worker_id, "No task within dequeue timeout");
                    } else {
                        error!(
                            subsystem = "jobs",
                            component = "worker",
                            worker_id,
                            error = %e,
                            "Failed to dequeue task"
                        );
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        info!(
            subsystem = "jobs",
            component = "worker",
            worker_id,
            "Worker stopped"
        );
        self.emit(WorkerEvent::WorkerStopped { worker_id });
    }

    async fn handle_task(&self, worker_id: usize, task: Task) {
        let start = Instant::now();
        let note_id = task.note_id;

        info!(worker_id, %note_id, "Processing task");
        self.emit(WorkerEvent::TaskStarted { note_id });

        let outcome = process_task(
            self.notes.as_ref(),
            self.processor.as_ref(),
            &task,
            self.config.process_timeout,
        )
        .await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(TaskOutcome::Completed { tag_count }) => {
                info!(worker_id, %note_id, tag_count, duration_ms, "Task completed");
                self.emit(WorkerEvent::TaskCompleted { note_id, tag_count });
            }
            Ok(TaskOutcome::Failed { error }) => {
                warn!(worker_id, %note_id, %error, duration_ms, "Task failed");
                self.emit(WorkerEvent::TaskFailed { note_id, error });
            }
            Ok(TaskOutcome::Abandoned) => {
                self.emit(WorkerEvent::TaskAbandoned { note_id });
            }
            Err(e) => {
                error!(
                    worker_id,
                    %note_id,
                    error = %e,
                    duration_ms,
                    "Failed to persist task result"
                );
                self.emit(WorkerEvent::TaskFailed {
                    note_id,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Handle for controlling a running pool.
pub struct WorkerPoolHandle {
    shutdown: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl WorkerPoolHandle {
    /// Stop starting new dequeues and wait for every worker to exit.
    ///
    /// A pending dequeue is cancelled without consuming its item; a task
    /// already being processed runs to completion first.
    pub async fn shutdown(self) {
        info!(
            subsystem = "jobs",
            component = "pool",
            workers = self.workers.len(),
            "Shutting down worker pool"
        );
        self.shutdown.cancel();

        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = ?e, "Worker task panicked");
            }
        }

        info!(subsystem = "jobs", component = "pool", "Worker pool stopped");
    }

    /// Get a receiver for pool events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of running worker loops.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// A fixed pool of worker loops sharing one queue.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        notes: Arc<dyn NoteRepository>,
        processor: Arc<dyn TextProcessor>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            shared: Arc::new(PoolShared {
                queue,
                notes,
                processor,
                config,
                event_tx,
            }),
        }
    }

    /// Get a receiver for pool events. Subscribe before [`start`](Self::start)
    /// to observe `WorkerStarted`.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.shared.event_tx.subscribe()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.shared.config
    }

    /// Spawn the worker loops and return a handle for control.
    pub fn start(self) -> WorkerPoolHandle {
        let shutdown = CancellationToken::new();
        let config = &self.shared.config;

        let workers = if config.enabled {
            info!(
                subsystem = "jobs",
                component = "pool",
                worker_count = config.worker_count,
                provider = self.shared.processor.provider(),
                dequeue_timeout_secs = config.dequeue_timeout.as_secs(),
                process_timeout_secs = config.process_timeout.as_secs(),
                "Starting worker pool"
            );
            (0..config.worker_count.max(1))
                .map(|worker_id| {
                    let shared = self.shared.clone();
                    tokio::spawn(shared.run_worker(worker_id, shutdown.clone()))
                })
                .collect()
        } else {
            info!("Worker pool is disabled, not starting");
            Vec::new()
        };

        WorkerPoolHandle {
            shutdown,
            workers,
            event_tx: self.shared.event_tx.clone(),
        }
    }
}
