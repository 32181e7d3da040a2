//! Task queues: Redis-backed for production, in-memory for tests.
//!
//! Both implementations keep tasks as JSON strings in a single FIFO list
//! and share the same cancellation contract: a dequeue that ends because
//! its context ended never consumes an item.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use tokio::sync::Notify;
use tracing::{debug, error, info, trace};

use glossa_core::{defaults, Error, OperationContext, Result, Task, TaskQueue};

/// Configuration for the Redis task queue.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub redis_url: String,
    /// Name of the Redis list holding serialized tasks.
    pub key: String,
    /// Server-side BLPOP timeout; bounds how long a dequeue takes to notice
    /// that its context ended.
    pub poll_timeout: Duration,
    /// Bound on the initial connect + PING.
    pub connect_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: defaults::REDIS_URL.to_string(),
            key: defaults::QUEUE_KEY.to_string(),
            poll_timeout: Duration::from_secs(defaults::QUEUE_POLL_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(defaults::QUEUE_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `REDIS_URL` | `redis://localhost:6379` | Redis connection URL |
    /// | `QUEUE_KEY` | `queue:note_processing` | List holding queued tasks |
    /// | `QUEUE_POLL_TIMEOUT_SECS` | `1` | BLPOP timeout per poll |
    pub fn from_env() -> Self {
        let default = Self::default();

        let redis_url = std::env::var("REDIS_URL").unwrap_or(default.redis_url);
        let key = std::env::var("QUEUE_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(default.key);
        let poll_timeout = std::env::var("QUEUE_POLL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(default.poll_timeout);

        Self {
            redis_url,
            key,
            poll_timeout,
            ..default
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

fn encode(task: &Task) -> Result<String> {
    Ok(serde_json::to_string(task)?)
}

fn decode(payload: &str) -> Result<Task> {
    serde_json::from_str(payload).map_err(|e| {
        error!(
            subsystem = "jobs",
            component = "queue",
            payload_len = payload.len(),
            error = %e,
            "Dropping malformed task payload"
        );
        Error::Serialization(format!("malformed task payload: {}", e))
    })
}

/// Redis list queue: `RPUSH` to enqueue, `BLPOP` to dequeue.
///
/// Enqueue and `LLEN` share one [`ConnectionManager`]. A blocking `BLPOP`
/// would stall every other command multiplexed on its connection, so each
/// concurrent dequeue borrows its own connection from a small idle set.
pub struct RedisTaskQueue {
    client: redis::Client,
    manager: ConnectionManager,
    blocking: Mutex<Vec<MultiplexedConnection>>,
    config: QueueConfig,
}

impl RedisTaskQueue {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(config: QueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| Error::Queue(format!("invalid Redis URL: {}", e)))?;

        let manager = tokio::time::timeout(config.connect_timeout, async {
            let mut manager = ConnectionManager::new(client.clone()).await?;
            let _: String = redis::cmd("PING").query_async(&mut manager).await?;
            Ok::<_, redis::RedisError>(manager)
        })
        .await
        .map_err(|_| Error::Queue("timed out connecting to Redis".to_string()))?
        .map_err(|e| Error::Queue(format!("failed to connect to Redis: {}", e)))?;

        info!(
            subsystem = "jobs",
            component = "queue",
            key = %config.key,
            poll_timeout_secs = config.poll_timeout.as_secs(),
            "Redis task queue connected"
        );

        Ok(Self {
            client,
            manager,
            blocking: Mutex::new(Vec::new()),
            config,
        })
    }

    pub async fn from_env() -> Result<Self> {
        Self::connect(QueueConfig::from_env()).await
    }

    pub fn key(&self) -> &str {
        &self.config.key
    }

    async fn checkout(&self) -> Result<MultiplexedConnection> {
        let idle = self
            .blocking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match idle {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        self.blocking
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(conn);
    }

    /// One bounded BLPOP. `None` when the poll timed out empty.
    async fn poll_once(&self) -> Result<Option<String>> {
        let mut conn = self.checkout().await?;
        // A connection that errors is dropped rather than returned.
        let popped: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.config.key)
            .arg(self.config.poll_timeout.as_secs_f64())
            .query_async(&mut conn)
            .await?;
        self.checkin(conn);
        Ok(popped.map(|(_, payload)| payload))
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: &Task) -> Result<()> {
        let payload = encode(task)?;
        let mut conn = self.manager.clone();
        let depth: i64 = conn.rpush(&self.config.key, payload).await?;
        debug!(
            subsystem = "jobs",
            component = "queue",
            op = "enqueue",
            note_id = %task.note_id,
            depth,
            "Task enqueued"
        );
        Ok(())
    }

    async fn dequeue(&self, ctx: &OperationContext) -> Result<Task> {
        loop {
            // An in-flight BLPOP is always allowed to finish, so an item it
            // pops is never lost to cancellation.
            ctx.check()?;
            if let Some(payload) = self.poll_once().await? {
                trace!(payload_len = payload.len(), "Dequeued task payload");
                return decode(&payload);
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.manager.clone();
        let len: usize = conn.llen(&self.config.key).await?;
        Ok(len)
    }
}

/// Process-local FIFO with the same contract as [`RedisTaskQueue`].
#[derive(Default)]
pub struct InMemoryTaskQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw payload, bypassing serialization.
    pub fn push_raw(&self, payload: impl Into<String>) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(payload.into());
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: &Task) -> Result<()> {
        self.push_raw(encode(task)?);
        Ok(())
    }

    async fn dequeue(&self, ctx: &OperationContext) -> Result<Task> {
        loop {
            ctx.check()?;

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(payload) = self.pop() {
                return decode(&payload);
            }

            tokio::select! {
                biased;
                err = ctx.cancelled() => return Err(err),
                _ = &mut notified => {}
            }
        }
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use uuid::Uuid;

    fn task(text: &str) -> Task {
        Task {
            note_id: Uuid::new_v4(),
            original_text: text.to_string(),
            user_id: Uuid::new_v4(),
            native_language: "en".to_string(),
            target_language: "de".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.key, "queue:note_processing");
        assert_eq!(config.poll_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_queue_config_builder() {
        let config = QueueConfig::default()
            .with_key("queue:test")
            .with_poll_timeout(Duration::from_secs(2));
        assert_eq!(config.key, "queue:test");
        assert_eq!(config.poll_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let queue = InMemoryTaskQueue::new();
        let original = task("Ich habe Hunger");
        queue.enqueue(&original).await.unwrap();
        let dequeued = queue.dequeue(&OperationContext::new()).await.unwrap();
        assert_eq!(dequeued, original);
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryTaskQueue::new();
        let a = task("a");
        let b = task("b");
        queue.enqueue(&a).await.unwrap();
        queue.enqueue(&b).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);

        let ctx = OperationContext::new();
        assert_eq!(queue.dequeue(&ctx).await.unwrap(), a);
        assert_eq!(queue.dequeue(&ctx).await.unwrap(), b);
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dequeue_waits_for_enqueue() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(&OperationContext::new()).await })
        };

        tokio::task::yield_now().await;
        let original = task("late");
        queue.enqueue(&original).await.unwrap();

        assert_eq!(consumer.await.unwrap().unwrap(), original);
    }

    #[tokio::test]
    async fn test_cancelled_context_leaves_item() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(&task("keep me")).await.unwrap();

        let ctx = OperationContext::new();
        ctx.cancel();
        assert!(matches!(queue.dequeue(&ctx).await, Err(Error::Cancelled)));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_deadline() {
        let queue = InMemoryTaskQueue::new();
        let ctx = OperationContext::with_timeout(Duration::from_secs(5));
        assert!(matches!(queue.dequeue(&ctx).await, Err(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let ctx = OperationContext::new();
        let waiter = {
            let queue = queue.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move { queue.dequeue(&ctx).await })
        };

        tokio::task::yield_now().await;
        ctx.cancel();
        assert!(matches!(waiter.await.unwrap(), Err(Error::Cancelled)));

        queue.enqueue(&task("after cancel")).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let queue = InMemoryTaskQueue::new();
        queue.push_raw("{not json");
        let err = queue.dequeue(&OperationContext::new()).await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
