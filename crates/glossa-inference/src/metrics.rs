//! Metrics sinks for provider calls.
//!
//! Clients receive a [`MetricsSink`] at construction. Nothing here touches
//! process-wide state when constructed, so any number of clients can be
//! built (in tests, say) without registration conflicts.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use glossa_core::{logging, MetricsSink, RequestOutcome};

/// Histogram of whole-call durations in seconds.
pub const REQUEST_DURATION_METRIC: &str = "llm_request_duration_seconds";

/// Counter of calls by outcome.
pub const REQUEST_COUNTER_METRIC: &str = "llm_requests_total";

/// Discards every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_request(&self, _provider: &str, _outcome: RequestOutcome, _duration: Duration) {}
}

/// Forwards observations to the `metrics` facade.
///
/// Whatever recorder the binary installs (Prometheus exporter, ...) receives
/// `llm_request_duration_seconds` and `llm_requests_total`, labelled by
/// `provider` and `status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FacadeMetrics;

impl MetricsSink for FacadeMetrics {
    fn record_request(&self, provider: &str, outcome: RequestOutcome, duration: Duration) {
        metrics::histogram!(
            REQUEST_DURATION_METRIC,
            logging::PROVIDER => provider.to_string(),
            logging::STATUS => outcome.as_str()
        )
        .record(duration.as_secs_f64());
        metrics::counter!(
            REQUEST_COUNTER_METRIC,
            logging::PROVIDER => provider.to_string(),
            logging::STATUS => outcome.as_str()
        )
        .increment(1);
    }
}

/// Aggregated observations for one `(provider, status)` label pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestStats {
    pub count: u64,
    pub total_duration: Duration,
}

/// Keeps observations in memory for inspection.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    stats: Mutex<HashMap<(String, RequestOutcome), RequestStats>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded for a label pair.
    pub fn count(&self, provider: &str, outcome: RequestOutcome) -> u64 {
        self.stats(provider, outcome).count
    }

    pub fn stats(&self, provider: &str, outcome: RequestOutcome) -> RequestStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(provider.to_string(), outcome))
            .copied()
            .unwrap_or_default()
    }

    /// Calls recorded across all labels.
    pub fn total(&self) -> u64 {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|s| s.count)
            .sum()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_request(&self, provider: &str, outcome: RequestOutcome, duration: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = stats.entry((provider.to_string(), outcome)).or_default();
        entry.count += 1;
        entry.total_duration += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_metrics_counts_by_label() {
        let metrics = InMemoryMetrics::new();
        metrics.record_request("openai", RequestOutcome::Success, Duration::from_millis(10));
        metrics.record_request("openai", RequestOutcome::Success, Duration::from_millis(30));
        metrics.record_request("openai", RequestOutcome::Error, Duration::from_millis(5));
        metrics.record_request("deepseek", RequestOutcome::Error, Duration::from_millis(5));

        assert_eq!(metrics.count("openai", RequestOutcome::Success), 2);
        assert_eq!(metrics.count("openai", RequestOutcome::Error), 1);
        assert_eq!(metrics.count("deepseek", RequestOutcome::Success), 0);
        assert_eq!(metrics.total(), 4);
        assert_eq!(
            metrics.stats("openai", RequestOutcome::Success).total_duration,
            Duration::from_millis(40)
        );
    }

    #[test]
    fn test_sinks_can_be_built_repeatedly() {
        for _ in 0..3 {
            let sink = FacadeMetrics;
            sink.record_request("openai", RequestOutcome::Success, Duration::from_millis(1));
            NoopMetrics.record_request("openai", RequestOutcome::Error, Duration::ZERO);
        }
    }
}
