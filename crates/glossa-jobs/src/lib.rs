//! # glossa-jobs
//!
//! Background enrichment for glossa notes.
//!
//! This crate provides:
//! - A durable FIFO task queue (Redis, or in-memory for tests)
//! - A fixed pool of workers driving each note to a terminal state
//! - Lifecycle notifications via broadcast channels
//! - The note service that creates notes and queues their tasks
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use glossa_jobs::{RedisTaskQueue, WorkerConfig, WorkerPool};
//!
//! let queue = Arc::new(RedisTaskQueue::from_env().await?);
//! let pool = WorkerPool::new(queue, notes, processor, WorkerConfig::from_env());
//!
//! // Start workers and get handle
//! let handle = pool.start();
//!
//! // Listen for events
//! let mut events = handle.events();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! // Graceful shutdown
//! handle.shutdown().await;
//! ```

pub mod queue;
pub mod service;
pub mod worker;

// Re-export core types
pub use glossa_core::*;

pub use queue::{InMemoryTaskQueue, QueueConfig, RedisTaskQueue};
pub use service::NoteService;
pub use worker::{
    failure_message, process_task, TaskOutcome, WorkerConfig, WorkerEvent, WorkerPool,
    WorkerPoolHandle,
};
