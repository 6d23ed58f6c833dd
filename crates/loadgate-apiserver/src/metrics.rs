//! Metrics about the extender itself, rendered in the Prometheus text
//! exposition format.

use loadgate_cache::CacheObserver;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Exponential bucket bounds: `start, start*factor, ...` (`count` values)
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    let mut bounds = Vec::with_capacity(count);
    let mut bound = start;
    for _ in 0..count {
        bounds.push(bound);
        bound *= factor;
    }
    bounds
}

/// Lock-free cumulative histogram
pub struct Histogram {
    bounds: Vec<f64>,
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_nanos: AtomicU64,
}

impl Histogram {
    pub fn new(bounds: Vec<f64>) -> Self {
        let buckets = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            buckets,
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
        }
    }

    /// Record one duration
    pub fn observe(&self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        if let Some(index) = self.bounds.iter().position(|bound| seconds <= *bound) {
            self.buckets[index].fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String, name: &str, help: &str) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} histogram", name);

        let mut cumulative = 0;
        for (bound, bucket) in self.bounds.iter().zip(&self.buckets) {
            cumulative += bucket.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, bound, cumulative);
        }

        let count = self.count();
        let sum = self.sum_nanos.load(Ordering::Relaxed) as f64 / 1e9;
        let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        let _ = writeln!(out, "{}_sum {}", name, sum);
        let _ = writeln!(out, "{}_count {}", name, count);
    }
}

fn latency_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.001, 2.0, 15))
}

/// Counters, histograms and gauges exported on `/metrics`
pub struct ServerMetrics {
    pub predicate_attempts: AtomicU64,
    pub predicate_successes: AtomicU64,
    pub priority_attempts: AtomicU64,
    pub priority_successes: AtomicU64,
    pub predicate_duration: Histogram,
    pub priority_duration: Histogram,
    pub fetch_duration: Histogram,
    pub fetch_errors: AtomicU64,
    pub cache_size: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            predicate_attempts: AtomicU64::new(0),
            predicate_successes: AtomicU64::new(0),
            priority_attempts: AtomicU64::new(0),
            priority_successes: AtomicU64::new(0),
            predicate_duration: latency_histogram(),
            priority_duration: latency_histogram(),
            fetch_duration: latency_histogram(),
            fetch_errors: AtomicU64::new(0),
            cache_size: AtomicU64::new(0),
        }
    }

    /// Render every metric in the Prometheus text format
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP schedule_attempts_total Number of attempts to schedule pods, by the result. 'success' means a pod could be scheduled, while 'count - success' means an internal scheduler problem.\n");
        out.push_str("# TYPE schedule_attempts_total counter\n");
        for (result, algorithm, counter) in [
            ("count", "predicate", &self.predicate_attempts),
            ("success", "predicate", &self.predicate_successes),
            ("count", "priority", &self.priority_attempts),
            ("success", "priority", &self.priority_successes),
        ] {
            let _ = writeln!(
                out,
                "schedule_attempts_total{{algorithm=\"{}\",result=\"{}\"}} {}",
                algorithm,
                result,
                counter.load(Ordering::Relaxed)
            );
        }

        self.predicate_duration.render(
            &mut out,
            "scheduling_algorithm_predicate_evaluation_seconds",
            "Scheduling algorithm predicate evaluation duration in seconds",
        );
        self.priority_duration.render(
            &mut out,
            "scheduling_algorithm_priority_evaluation_seconds",
            "Scheduling algorithm priority evaluation duration in seconds",
        );
        self.fetch_duration.render(
            &mut out,
            "from_prometheus_get_data_evaluation_seconds",
            "From prometheus get data evaluation duration in seconds",
        );

        out.push_str("# HELP from_prometheus_get_data_error Number of attempts to from prometheus get data error.\n");
        out.push_str("# TYPE from_prometheus_get_data_error counter\n");
        let _ = writeln!(
            out,
            "from_prometheus_get_data_error {}",
            self.fetch_errors.load(Ordering::Relaxed)
        );

        out.push_str("# HELP node_cache_size Number of nodes from prometheus search, in the cache.\n");
        out.push_str("# TYPE node_cache_size gauge\n");
        let _ = writeln!(
            out,
            "node_cache_size {}",
            self.cache_size.load(Ordering::Relaxed)
        );

        out
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheObserver for ServerMetrics {
    fn fetch_completed(&self, elapsed: Duration, succeeded: bool) {
        self.fetch_duration.observe(elapsed);
        if !succeeded {
            self.fetch_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn cache_size(&self, size: usize) {
        self.cache_size.store(size as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_buckets() {
        let bounds = exponential_buckets(0.001, 2.0, 15);
        assert_eq!(bounds.len(), 15);
        assert_eq!(bounds[0], 0.001);
        assert_eq!(bounds[1], 0.002);
        assert_eq!(bounds[14], 0.001 * 16384.0);
    }

    #[test]
    fn test_histogram_is_cumulative() {
        let histogram = Histogram::new(vec![0.01, 0.1, 1.0]);
        histogram.observe(Duration::from_millis(5));
        histogram.observe(Duration::from_millis(50));
        histogram.observe(Duration::from_secs(5));

        let mut out = String::new();
        histogram.render(&mut out, "test_seconds", "Test");

        assert!(out.contains("test_seconds_bucket{le=\"0.01\"} 1\n"));
        assert!(out.contains("test_seconds_bucket{le=\"0.1\"} 2\n"));
        assert!(out.contains("test_seconds_bucket{le=\"1\"} 2\n"));
        assert!(out.contains("test_seconds_bucket{le=\"+Inf\"} 3\n"));
        assert!(out.contains("test_seconds_count 3\n"));
    }

    #[test]
    fn test_cache_observer_updates_metrics() {
        let metrics = ServerMetrics::new();
        metrics.fetch_completed(Duration::from_millis(20), true);
        metrics.fetch_completed(Duration::from_millis(20), false);
        metrics.cache_size(42);

        assert_eq!(metrics.fetch_duration.count(), 2);
        assert_eq!(metrics.fetch_errors.load(Ordering::Relaxed), 1);

        let rendered = metrics.render();
        assert!(rendered.contains("from_prometheus_get_data_error 1\n"));
        assert!(rendered.contains("node_cache_size 42\n"));
        assert!(rendered.contains("from_prometheus_get_data_evaluation_seconds_count 2\n"));
    }

    #[test]
    fn test_render_attempt_counters() {
        let metrics = ServerMetrics::new();
        metrics.predicate_attempts.fetch_add(3, Ordering::Relaxed);
        metrics.predicate_successes.fetch_add(2, Ordering::Relaxed);

        let rendered = metrics.render();
        assert!(rendered
            .contains("schedule_attempts_total{algorithm=\"predicate\",result=\"count\"} 3\n"));
        assert!(rendered
            .contains("schedule_attempts_total{algorithm=\"predicate\",result=\"success\"} 2\n"));
        assert!(rendered
            .contains("schedule_attempts_total{algorithm=\"priority\",result=\"count\"} 0\n"));
    }
}
