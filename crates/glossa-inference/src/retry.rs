//! Retry with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use glossa_core::{defaults, OperationContext, Result};

/// Retry behaviour for provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_wait: Duration,
    /// Cap on any single wait.
    pub max_wait: Duration,
    /// Growth factor between waits.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::LLM_MAX_RETRIES,
            initial_wait: Duration::from_millis(defaults::LLM_INITIAL_WAIT_MS),
            max_wait: Duration::from_millis(defaults::LLM_MAX_WAIT_MS),
            multiplier: defaults::LLM_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LLM_MAX_RETRIES` | `3` | Retries after the first attempt |
    /// | `LLM_INITIAL_WAIT_MS` | `500` | First backoff wait |
    /// | `LLM_MAX_WAIT_MS` | `10000` | Backoff cap |
    pub fn from_env() -> Self {
        let default = Self::default();
        let max_retries = std::env::var("LLM_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(default.max_retries);
        let initial_wait = std::env::var("LLM_INITIAL_WAIT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(default.initial_wait);
        let max_wait = std::env::var("LLM_MAX_WAIT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(default.max_wait);

        Self {
            max_retries,
            initial_wait,
            max_wait,
            ..default
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_wait(mut self, wait: Duration) -> Self {
        self.initial_wait = wait;
        self
    }

    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = wait;
        self
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait following `current`, capped at `max_wait`.
    pub fn next_wait(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_wait)
    }

    /// The sequence of waits between attempts.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut waits = Vec::with_capacity(self.max_retries as usize);
        let mut wait = self.initial_wait.min(self.max_wait);
        for _ in 0..self.max_retries {
            waits.push(wait);
            wait = self.next_wait(wait);
        }
        waits
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
///
/// `op` receives the 1-based attempt number. Both the attempt itself and the
/// backoff wait race against `ctx`; when the context ends, its error is
/// returned at once and no further attempt is made.
pub async fn with_retry<T, F, Fut>(
    ctx: &OperationContext,
    config: &RetryConfig,
    mut op: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    ctx.check()?;

    let mut wait = config.initial_wait.min(config.max_wait);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            err = ctx.cancelled() => return Err(err),
            result = op(attempt) => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!(attempt, error = %err, "Non-retryable error, giving up");
            return Err(err);
        }

        if attempt >= config.max_attempts() {
            warn!(attempt, error = %err, "Retry budget exhausted");
            return Err(err);
        }

        warn!(
            attempt,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "Retryable error, backing off"
        );

        tokio::select! {
            biased;
            err = ctx.cancelled() => return Err(err),
            _ = tokio::time::sleep(wait) => {}
        }

        wait = config.next_wait(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use glossa_core::{Error, ProviderError};

    fn server_error() -> Error {
        ProviderError::from_status(500, "boom", "test").into()
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_wait, Duration::from_millis(500));
        assert_eq!(config.max_wait, Duration::from_secs(10));
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_backoff_schedule() {
        let config = RetryConfig::default();
        assert_eq!(
            config.backoff_schedule(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(750),
                Duration::from_millis(1125),
            ]
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig::default()
            .with_max_retries(20)
            .with_max_wait(Duration::from_secs(2));
        let schedule = config.backoff_schedule();
        assert_eq!(schedule.len(), 20);
        assert!(schedule.iter().all(|w| *w <= Duration::from_secs(2)));
        assert_eq!(*schedule.last().unwrap(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = OperationContext::new();
        let config = RetryConfig::default();

        let counter = calls.clone();
        let result: Result<()> = with_retry(&ctx, &config, |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Provider(ref e)) if e.status == 500));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = OperationContext::new();

        let counter = calls.clone();
        let result: Result<()> = with_retry(&ctx, &RetryConfig::default(), |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::from_status(404, "nope", "test").into())
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let ctx = OperationContext::new();
        let result = with_retry(&ctx, &RetryConfig::default(), |attempt| async move {
            if attempt < 3 {
                Err(ProviderError::from_status(429, "slow down", "test").into())
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_aborts() {
        let calls = Arc::new(AtomicU32::new(0));
        let ctx = OperationContext::new();
        let config = RetryConfig::default().with_initial_wait(Duration::from_secs(60));

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let counter = calls.clone();
        let result: Result<()> = with_retry(&ctx, &config, |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(server_error())
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_backoff_reports_deadline() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(2));
        let config = RetryConfig::default().with_initial_wait(Duration::from_secs(5));

        let result: Result<()> = with_retry(&ctx, &config, |_| async { Err(server_error()) }).await;
        assert!(matches!(result, Err(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_attempt() {
        let ctx = OperationContext::new();
        ctx.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<()> = with_retry(&ctx, &RetryConfig::default(), |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
