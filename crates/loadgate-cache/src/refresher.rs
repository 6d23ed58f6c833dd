use crate::cache::{EvictionOutcome, LoadSample, MetricsCache};
use crate::error::Result;
use crate::prometheus::PrometheusClient;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Receives cache maintenance events. Implementations must not block.
pub trait CacheObserver: Send + Sync {
    /// A fetch cycle finished
    fn fetch_completed(&self, elapsed: Duration, succeeded: bool);

    /// An eviction sweep left `size` entries in the cache
    fn cache_size(&self, size: usize);
}

/// Observer that discards every event
pub struct NoopObserver;

impl CacheObserver for NoopObserver {
    fn fetch_completed(&self, _elapsed: Duration, _succeeded: bool) {}

    fn cache_size(&self, _size: usize) {}
}

/// Configuration for the background cache tasks
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Interval between metrics backend queries
    pub fetch_interval: Duration,
    /// Interval between eviction sweeps
    pub evict_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fetch_interval: Duration::from_secs(60),
            evict_interval: Duration::from_secs(30),
        }
    }
}

/// Keeps a [`MetricsCache`] populated from Prometheus and prunes stale entries
pub struct CacheRefresher {
    cache: Arc<MetricsCache>,
    client: PrometheusClient,
    observer: Arc<dyn CacheObserver>,
    config: CacheConfig,
}

impl CacheRefresher {
    pub fn new(cache: Arc<MetricsCache>, client: PrometheusClient, config: CacheConfig) -> Self {
        Self {
            cache,
            client,
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    /// Report fetch and eviction events to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cache(&self) -> &Arc<MetricsCache> {
        &self.cache
    }

    /// Run the fetch and eviction loops until `token` is cancelled
    pub async fn run(&self, token: CancellationToken) {
        info!(
            "Starting cache refresher (fetch every {:?}, evict every {:?}, window {}s)",
            self.config.fetch_interval,
            self.config.evict_interval,
            self.cache.overdue_window().num_seconds()
        );

        tokio::join!(
            self.run_fetch_loop(token.clone()),
            self.run_evict_loop(token)
        );

        info!("Cache refresher stopped");
    }

    /// Query the backend immediately, then once per fetch interval
    pub async fn run_fetch_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.fetch_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Fetch loop shutting down");
                    return;
                }
                _ = interval.tick() => {
                    let fetch = self.refresh_once();
                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!("Fetch loop shutting down mid-query");
                            return;
                        }
                        result = fetch => {
                            if let Err(e) = result {
                                error!("Failed to refresh node memory cache: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    /// Sweep overdue entries immediately, then once per evict interval
    pub async fn run_evict_loop(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.evict_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Evict loop shutting down");
                    return;
                }
                _ = interval.tick() => {
                    self.evict_once();
                }
            }
        }
    }

    /// One fetch cycle. On failure the cache is left untouched.
    pub async fn refresh_once(&self) -> Result<usize> {
        let start = Instant::now();
        let result = self.client.fetch().await;
        self.observer
            .fetch_completed(start.elapsed(), result.is_ok());

        let values = result?;
        let observed_at = Utc::now();
        let count = values.len();

        for (node_name, value) in values {
            // One write lock per entry so readers never wait for the whole batch
            self.cache
                .insert(LoadSample::new(node_name, value, observed_at));
        }

        debug!(
            "Refreshed {} node samples from {} in {:?}",
            count,
            self.client.base_url(),
            start.elapsed()
        );

        Ok(count)
    }

    /// One eviction sweep
    pub fn evict_once(&self) -> EvictionOutcome {
        let outcome = self.cache.evict_overdue(Utc::now());
        self.observer.cache_size(outcome.remaining);
        outcome
    }
}
