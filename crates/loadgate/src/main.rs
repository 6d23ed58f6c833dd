use clap::Parser;
use loadgate_apiserver::{ApiServer, AppState, Config as ApiConfig, ServerMetrics};
use loadgate_cache::{CacheConfig, CacheRefresher, MetricsCache, PrometheusClient};
use loadgate_scheduler::{AlgorithmRegistry, Scheduler, SchedulerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "loadgate",
    about = "Kubernetes scheduler extender that steers pods away from memory-loaded nodes"
)]
struct Cli {
    /// Base URL of the Prometheus server
    #[arg(long, env = "PROMETHEUS_URL", default_value = "http://127.0.0.1:9090")]
    prometheus_url: String,

    /// Metric (or PromQL expression) reporting memory usage percent per node
    #[arg(
        long,
        env = "PROMETHEUS_MEMORY_METRICS",
        default_value = "HostMemoryUsagePercent"
    )]
    prometheus_memory_metrics: String,

    /// Memory usage percent at or above which a node is filtered out
    #[arg(long, env = "PROMETHEUS_MEMORY_THRESHOLD", default_value_t = 80)]
    prometheus_memory_threshold: i64,

    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = "0.0.0.0:8888")]
    listen_address: SocketAddr,

    /// Log every extender request body
    #[arg(long, env = "LOG_REQUEST_BODY")]
    log_request_body: bool,

    /// Seconds between Prometheus queries
    #[arg(
        long,
        env = "FETCH_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    fetch_interval_secs: u64,

    /// Seconds between eviction sweeps
    #[arg(
        long,
        env = "EVICT_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    evict_interval_secs: u64,

    /// Age in seconds after which a sample is stale
    #[arg(
        long,
        env = "NODE_OVERDUE_SECS",
        default_value_t = 180,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    overdue_secs: u64,

    /// Prometheus request timeout in seconds
    #[arg(
        long,
        env = "QUERY_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    query_timeout_secs: u64,

    /// Nodes evaluated concurrently per request
    #[arg(
        long,
        env = "PARALLELISM",
        default_value_t = 16,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    parallelism: u64,

    /// Comma-separated predicate order (default: every registered predicate)
    #[arg(long, env = "PREDICATES", value_delimiter = ',')]
    predicates: Option<Vec<String>>,

    /// Comma-separated priority order (default: every registered priority)
    #[arg(long, env = "PRIORITIES", value_delimiter = ',')]
    priorities: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await
}

/// Wire the cache, refresher, scheduler and HTTP server, then wait for ctrl-c
async fn run(cli: Cli) -> miette::Result<()> {
    info!("Starting loadgate with {:?}", cli);

    let cache = Arc::new(MetricsCache::new(Duration::from_secs(cli.overdue_secs)));
    let metrics = Arc::new(ServerMetrics::new());

    let client = PrometheusClient::new(
        &cli.prometheus_url,
        cli.prometheus_memory_metrics.as_str(),
        Duration::from_secs(cli.query_timeout_secs),
    )?;
    let cache_config = CacheConfig {
        fetch_interval: Duration::from_secs(cli.fetch_interval_secs),
        evict_interval: Duration::from_secs(cli.evict_interval_secs),
    };
    let refresher =
        CacheRefresher::new(cache.clone(), client, cache_config).with_observer(metrics.clone());

    let registry = build_registry(&cli, cache.clone());
    let scheduler = Scheduler::new(
        registry,
        SchedulerConfig {
            parallelism: cli.parallelism as usize,
        },
    )?;

    let state = Arc::new(
        AppState::new(Arc::new(scheduler), metrics).with_request_body_logging(cli.log_request_body),
    );

    let token = CancellationToken::new();

    // 1. Spawn cache refresher
    let refresher_token = token.clone();
    let refresher_handle = tokio::spawn(async move {
        refresher.run(refresher_token).await;
    });

    // 2. Spawn API server
    let api_server = ApiServer::new(
        ApiConfig {
            listen_addr: cli.listen_address,
        },
        state,
    );
    let api_token = token.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api_server.run(api_token).await {
            error!("API server error: {}", e);
        }
    });

    // 3. Spawn debug dump listener
    let dump_handle = spawn_debug_dump(format!("{:?}", cli), cache, token.clone());

    info!("All components started. Extender on {}", cli.listen_address);

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for ctrl-c: {}", e))?;

    info!("Shutting down gracefully...");
    token.cancel();

    // Wait for all tasks to finish with a timeout
    let shutdown_timeout = Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, async {
        let _ = tokio::join!(refresher_handle, api_handle, dump_handle);
    })
    .await;

    info!("Shutdown complete");

    Ok(())
}

/// Memory-load registry with the CLI's order overrides applied
fn build_registry(cli: &Cli, cache: Arc<MetricsCache>) -> AlgorithmRegistry {
    let mut registry = AlgorithmRegistry::with_memory_load(cache, cli.prometheus_memory_threshold);
    if let Some(order) = &cli.predicates {
        registry.set_predicate_order(trimmed(order));
    }
    if let Some(order) = &cli.priorities {
        registry.set_priority_order(trimmed(order));
    }
    registry
}

fn trimmed(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Log the configuration and every cached sample on SIGUSR2
#[cfg(unix)]
fn spawn_debug_dump(
    config: String,
    cache: Arc<MetricsCache>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut signals = match signal(SignalKind::user_defined2()) {
            Ok(signals) => signals,
            Err(e) => {
                error!("Failed to listen for SIGUSR2: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                received = signals.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("Configuration: {}", config);
                    let samples = cache.snapshot();
                    info!("Cache holds {} samples", samples.len());
                    for sample in samples {
                        info!("{}", sample);
                    }
                }
            }
        }
    })
}

#[cfg(not(unix))]
fn spawn_debug_dump(
    _config: String,
    _cache: Arc<MetricsCache>,
    _token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["loadgate"]).unwrap();
        assert_eq!(cli.prometheus_memory_threshold, 80);
        assert_eq!(cli.listen_address.to_string(), "0.0.0.0:8888");
        assert_eq!(cli.overdue_secs, 180);
        assert!(cli.predicates.is_none());
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["loadgate", "--fetch-interval-secs", "0"]).is_err());
    }

    #[test]
    fn test_order_overrides() {
        let cli = Cli::try_parse_from([
            "loadgate",
            "--predicates",
            "",
            "--priorities",
            "CheckMemoryLoad, Other",
        ])
        .unwrap();
        let registry = build_registry(&cli, Arc::new(MetricsCache::default()));

        assert!(registry.predicate_order().is_empty());
        assert_eq!(
            registry.priority_order(),
            ["CheckMemoryLoad".to_string(), "Other".to_string()]
        );
    }
}
