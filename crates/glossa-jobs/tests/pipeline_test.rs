//! End-to-end pipeline tests with in-memory collaborators.
//!
//! This test suite validates:
//! - Submitted notes reach `Completed` with their tags
//! - Provider failures and empty content end in `Failed`
//! - Tasks for missing notes are abandoned
//! - Shutdown stops dequeuing without consuming queued tasks
//! - Several workers drain the queue concurrently
//! - A note enqueued twice is processed once
//! - Dequeue timeouts are followed by the error backoff

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use glossa_db::{InMemoryNoteRepository, InMemoryUserRepository};
use glossa_inference::mock::MockTextProcessor;
use glossa_jobs::{
    process_task, Error, InMemoryTaskQueue, NoteRepository, NoteService, NoteStatus,
    OperationContext, Result, Task, TaskOutcome, TaskQueue, User, WorkerConfig, WorkerEvent,
    WorkerPool,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct Pipeline {
    queue: Arc<InMemoryTaskQueue>,
    notes: Arc<InMemoryNoteRepository>,
    service: NoteService,
    user: User,
}

fn pipeline() -> Pipeline {
    let user = User::new("lena", "lena@example.test", "en", "de");
    let queue = Arc::new(InMemoryTaskQueue::new());
    let notes = Arc::new(InMemoryNoteRepository::new());
    let users = Arc::new(InMemoryUserRepository::with_users([user.clone()]));
    let service = NoteService::new(notes.clone(), users, queue.clone());
    Pipeline {
        queue,
        notes,
        service,
        user,
    }
}

fn fast_config() -> WorkerConfig {
    WorkerConfig::default()
        .with_dequeue_timeout(Duration::from_millis(200))
        .with_process_timeout(Duration::from_secs(5))
        .with_error_backoff(Duration::from_millis(10))
}

/// Wait until `count` tasks have reached a terminal event.
async fn wait_for_finished(events: &mut broadcast::Receiver<WorkerEvent>, count: usize) {
    let mut finished = 0;
    timeout(Duration::from_secs(10), async {
        while finished < count {
            match events.recv().await {
                Ok(WorkerEvent::TaskCompleted { .. })
                | Ok(WorkerEvent::TaskFailed { .. })
                | Ok(WorkerEvent::TaskAbandoned { .. }) => finished += 1,
                Ok(_) => {}
                Err(e) => panic!("event channel error: {}", e),
            }
        }
    })
    .await
    .expect("Timed out waiting for tasks to finish");
}

/// Queue whose every dequeue times out immediately.
#[derive(Default)]
struct ExpiringQueue {
    dequeues: AtomicUsize,
}

#[async_trait]
impl TaskQueue for ExpiringQueue {
    async fn enqueue(&self, _task: &Task) -> Result<()> {
        Ok(())
    }

    async fn dequeue(&self, _ctx: &OperationContext) -> Result<Task> {
        self.dequeues.fetch_add(1, Ordering::SeqCst);
        Err(Error::DeadlineExceeded)
    }

    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
}

// ============================================================================
// SINGLE TASK
// ============================================================================

#[tokio::test]
async fn test_task_completes_with_tags() {
    let p = pipeline();
    let processor = MockTextProcessor::new().with_content("explanation", &["grammar", "idiom"]);
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Ich habe Hunger")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    let outcome = process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Completed { tag_count: 2 });
    let stored = p.notes.get(note.id).await.unwrap();
    assert_eq!(stored.status, NoteStatus::Completed);
    assert_eq!(stored.generated_content.as_deref(), Some("explanation"));
    assert_eq!(stored.tag_names(), vec!["grammar", "idiom"]);
    assert!(stored.error_message.is_none());

    let calls = processor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text, "Ich habe Hunger");
    assert_eq!(calls[0].source_language, "en");
    assert_eq!(calls[0].target_language, "de");
}

#[tokio::test]
async fn test_empty_content_fails_note() {
    let p = pipeline();
    let processor = MockTextProcessor::new().with_content("", &["grammar"]);
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Guten Morgen")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    let outcome = process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    assert!(matches!(outcome, TaskOutcome::Failed { .. }));
    let stored = p.notes.get(note.id).await.unwrap();
    assert_eq!(stored.status, NoteStatus::Failed);
    assert_eq!(
        stored.error_message.as_deref(),
        Some("Failed to process text: provider returned empty content")
    );
    assert!(stored.generated_content.is_none());
    assert!(stored.tags.is_empty());
}

#[tokio::test]
async fn test_provider_failure_fails_note() {
    let p = pipeline();
    let processor = MockTextProcessor::new().with_failure(500, "upstream exploded");
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Tschüss")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    let stored = p.notes.get(note.id).await.unwrap();
    assert_eq!(stored.status, NoteStatus::Failed);
    let message = stored.error_message.unwrap();
    assert!(message.starts_with("Failed to process text: "));
    assert!(message.contains("upstream exploded"));
}

#[tokio::test]
async fn test_unparseable_reply_fails_note() {
    let p = pipeline();
    let processor = MockTextProcessor::new().with_raw_reply("not json at all");
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Danke")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(
        p.notes.get(note.id).await.unwrap().status,
        NoteStatus::Failed
    );
}

#[tokio::test]
async fn test_processing_timeout_fails_note() {
    let p = pipeline();
    let processor = MockTextProcessor::new().with_latency(Duration::from_secs(30));
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Bitte")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    process_task(
        p.notes.as_ref(),
        &processor,
        &task,
        Duration::from_millis(50),
    )
    .await
    .unwrap();

    let stored = p.notes.get(note.id).await.unwrap();
    assert_eq!(stored.status, NoteStatus::Failed);
    assert!(stored.error_message.unwrap().contains("deadline"));
}

#[tokio::test]
async fn test_missing_note_is_abandoned() {
    let p = pipeline();
    let processor = MockTextProcessor::new();
    let task = Task {
        note_id: Uuid::new_v4(),
        original_text: "ghost".to_string(),
        user_id: p.user.id,
        native_language: "en".to_string(),
        target_language: "de".to_string(),
        created_at: chrono::Utc::now(),
    };

    let outcome = process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(outcome, TaskOutcome::Abandoned);
    assert_eq!(processor.call_count(), 0);
}

#[tokio::test]
async fn test_already_finished_note_is_abandoned() {
    let p = pipeline();
    let processor = MockTextProcessor::new();
    p.service
        .submit(&OperationContext::new(), p.user.id, "Hallo")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();

    process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();
    let again = process_task(p.notes.as_ref(), &processor, &task, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(again, TaskOutcome::Abandoned);
    assert_eq!(processor.call_count(), 1);
}

// ============================================================================
// WORKER POOL
// ============================================================================

#[tokio::test]
async fn test_pool_processes_submitted_notes() {
    let p = pipeline();
    let processor = Arc::new(
        MockTextProcessor::new()
            .with_content("default", &["misc"])
            .with_content_for("Ich habe Hunger", "hunger", &["grammar", "idiom"]),
    );
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor.clone(),
        fast_config().with_worker_count(3),
    );
    let mut events = pool.events();
    let handle = pool.start();
    assert_eq!(handle.worker_count(), 3);

    let mut ids = Vec::new();
    for text in ["Ich habe Hunger", "Guten Tag", "Wie geht's", "Bis bald"] {
        let note = p
            .service
            .submit(&OperationContext::new(), p.user.id, text)
            .await
            .unwrap();
        ids.push(note.id);
    }

    wait_for_finished(&mut events, ids.len()).await;
    handle.shutdown().await;

    for id in &ids {
        assert_eq!(p.notes.get(*id).await.unwrap().status, NoteStatus::Completed);
    }
    assert_eq!(
        p.notes.get(ids[0]).await.unwrap().tag_names(),
        vec!["grammar", "idiom"]
    );
    assert_eq!(processor.call_count(), 4);
    assert_eq!(p.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_pool_emits_lifecycle_events() {
    let p = pipeline();
    let processor = Arc::new(MockTextProcessor::new().with_content("c", &["a"]));
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor,
        fast_config().with_worker_count(1),
    );
    let mut events = pool.events();
    let handle = pool.start();

    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Hallo")
        .await
        .unwrap();

    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.unwrap();
            let done = matches!(event, WorkerEvent::TaskCompleted { .. });
            seen.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .expect("Timed out waiting for completion");
    handle.shutdown().await;
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert_eq!(
        seen,
        vec![
            WorkerEvent::WorkerStarted { worker_id: 0 },
            WorkerEvent::TaskStarted { note_id: note.id },
            WorkerEvent::TaskCompleted {
                note_id: note.id,
                tag_count: 1
            },
            WorkerEvent::WorkerStopped { worker_id: 0 },
        ]
    );
}

#[tokio::test]
async fn test_shutdown_leaves_queued_tasks() {
    let p = pipeline();
    let processor = Arc::new(MockTextProcessor::new());
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor.clone(),
        fast_config().with_worker_count(2),
    );
    let mut events = pool.events();
    let handle = pool.start();

    // Let both workers block in dequeue.
    for _ in 0..2 {
        let started = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
        assert!(matches!(started, Ok(WorkerEvent::WorkerStarted { .. })));
    }
    sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown should return once workers stop");

    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "nach dem Ende")
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(p.queue.len().await.unwrap(), 1);
    assert_eq!(p.notes.get(note.id).await.unwrap().status, NoteStatus::Pending);
    assert_eq!(processor.call_count(), 0);
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_task() {
    let p = pipeline();
    let processor = Arc::new(
        MockTextProcessor::new()
            .with_content("slow", &["patience"])
            .with_latency(Duration::from_millis(300)),
    );
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor,
        fast_config().with_worker_count(1),
    );
    let mut events = pool.events();
    let handle = pool.start();

    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "langsam")
        .await
        .unwrap();
    timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(WorkerEvent::TaskStarted { .. }) = events.recv().await {
                break;
            }
        }
    })
    .await
    .unwrap();

    handle.shutdown().await;

    assert_eq!(
        p.notes.get(note.id).await.unwrap().status,
        NoteStatus::Completed
    );
}

#[tokio::test]
async fn test_disabled_pool_starts_no_workers() {
    let p = pipeline();
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        Arc::new(MockTextProcessor::new()),
        fast_config().with_enabled(false),
    );
    let handle = pool.start();
    assert_eq!(handle.worker_count(), 0);

    p.service
        .submit(&OperationContext::new(), p.user.id, "Hallo")
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    handle.shutdown().await;

    assert_eq!(p.queue.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_payload_does_not_stop_worker() {
    let p = pipeline();
    let processor = Arc::new(MockTextProcessor::new().with_content("c", &["t"]));
    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor,
        fast_config().with_worker_count(1),
    );
    let mut events = pool.events();
    let handle = pool.start();

    p.queue.push_raw("{not a task");
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "danach")
        .await
        .unwrap();

    wait_for_finished(&mut events, 1).await;
    handle.shutdown().await;

    assert_eq!(
        p.notes.get(note.id).await.unwrap().status,
        NoteStatus::Completed
    );
}

#[tokio::test]
async fn test_duplicate_task_processed_once() {
    let p = pipeline();
    let processor = Arc::new(
        MockTextProcessor::new()
            .with_content("einmal", &["grammar"])
            .with_latency(Duration::from_millis(200)),
    );
    let note = p
        .service
        .submit(&OperationContext::new(), p.user.id, "Doppelt gemoppelt")
        .await
        .unwrap();
    let task = p.queue.dequeue(&OperationContext::new()).await.unwrap();
    p.queue.enqueue(&task).await.unwrap();
    p.queue.enqueue(&task).await.unwrap();

    let pool = WorkerPool::new(
        p.queue.clone(),
        p.notes.clone(),
        processor.clone(),
        fast_config().with_worker_count(2),
    );
    let mut events = pool.events();
    let handle = pool.start();

    let mut completed = 0;
    let mut abandoned = 0;
    timeout(Duration::from_secs(10), async {
        while completed + abandoned < 2 {
            match events.recv().await.unwrap() {
                WorkerEvent::TaskCompleted { .. } => completed += 1,
                WorkerEvent::TaskAbandoned { .. } => abandoned += 1,
                WorkerEvent::TaskFailed { error, .. } => panic!("unexpected failure: {}", error),
                _ => {}
            }
        }
    })
    .await
    .expect("Timed out waiting for both tasks");
    handle.shutdown().await;

    assert_eq!((completed, abandoned), (1, 1));
    assert_eq!(processor.call_count(), 1);
    let stored = p.notes.get(note.id).await.unwrap();
    assert_eq!(stored.status, NoteStatus::Completed);
    assert_eq!(stored.generated_content.as_deref(), Some("einmal"));
    assert_eq!(p.queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_dequeue_timeout_backs_off() {
    let p = pipeline();
    let queue = Arc::new(ExpiringQueue::default());
    let pool = WorkerPool::new(
        queue.clone(),
        p.notes.clone(),
        Arc::new(MockTextProcessor::new()),
        fast_config()
            .with_worker_count(1)
            .with_error_backoff(Duration::from_millis(200)),
    );
    let handle = pool.start();

    sleep(Duration::from_millis(500)).await;
    timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("shutdown should interrupt the backoff");

    let dequeues = queue.dequeues.load(Ordering::SeqCst);
    assert!(
        (1..=4).contains(&dequeues),
        "expected a handful of dequeues, got {}",
        dequeues
    );
}
