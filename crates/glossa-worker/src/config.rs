//! Process configuration assembled from the environment.

use std::net::SocketAddr;

use glossa_core::{defaults, Error, Result};
use glossa_inference::ProviderConfig;
use glossa_jobs::{QueueConfig, WorkerConfig};

/// Everything the worker binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Prometheus scrape listener; no exporter is installed when unset.
    pub metrics_addr: Option<SocketAddr>,
    pub queue: QueueConfig,
    pub provider: ProviderConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DATABASE_URL` | local Postgres | Note and user store |
    /// | `METRICS_ADDR` | unset | Prometheus listener, e.g. `0.0.0.0:9090` |
    ///
    /// The remaining settings come from [`QueueConfig::from_env`],
    /// [`ProviderConfig::from_env`] and [`WorkerConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.provider = ProviderConfig::from_env()?;
        config.queue = QueueConfig::from_env();
        config.worker = WorkerConfig::from_env();
        Ok(config)
    }

    /// Build from an arbitrary variable lookup. Queue, retry and worker
    /// settings stay at their defaults.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| defaults::DATABASE_URL.to_string());

        let metrics_addr = lookup("METRICS_ADDR")
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<SocketAddr>()
                    .map_err(|e| Error::Config(format!("invalid METRICS_ADDR {:?}: {}", v, e)))
            })
            .transpose()?;

        Ok(Self {
            database_url,
            metrics_addr,
            queue: QueueConfig::default(),
            provider: ProviderConfig::from_vars(&lookup)?,
            worker: WorkerConfig::default(),
        })
    }

    /// Advisory checks. Returns human-readable warnings; never fails.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.provider.has_api_key() {
            warnings.push(format!(
                "{} is not set; the {} provider cannot be used",
                self.provider.kind.api_key_var(),
                self.provider.kind.display_name()
            ));
        }

        if !self.worker.enabled {
            warnings.push("WORKER_ENABLED=false; queued notes will not be processed".to_string());
        }

        warnings
    }
}
