use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// How long a sample is trusted after it was observed
pub const DEFAULT_OVERDUE_WINDOW: Duration = Duration::from_secs(180);

/// Most recent memory-load observation for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSample {
    /// Node identity as reported by the metrics backend
    pub node_name: String,
    /// Memory utilization percentage (0-100)
    pub value: i64,
    /// When the sample was fetched
    pub observed_at: DateTime<Utc>,
}

impl LoadSample {
    /// Create a new sample
    pub fn new(node_name: impl Into<String>, value: i64, observed_at: DateTime<Utc>) -> Self {
        Self {
            node_name: node_name.into(),
            value,
            observed_at,
        }
    }

    /// Age of the sample relative to `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.observed_at
    }
}

impl fmt::Display for LoadSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodeName:{}; memoryValue:{}; checkTime:{};",
            self.node_name,
            self.value,
            self.observed_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Result of one eviction sweep
#[derive(Debug, Clone, Default)]
pub struct EvictionOutcome {
    /// Samples removed by the sweep
    pub evicted: Vec<LoadSample>,
    /// Entries left in the cache when the lock was released
    pub remaining: usize,
}

/// Process-wide node load cache.
///
/// Readers always receive copies; writers replace whole samples. The lock is
/// never held across I/O.
pub struct MetricsCache {
    entries: RwLock<HashMap<String, LoadSample>>,
    overdue_window: chrono::Duration,
}

impl MetricsCache {
    /// Create an empty cache with the given staleness window
    pub fn new(overdue_window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            overdue_window: chrono::Duration::from_std(overdue_window)
                .unwrap_or(chrono::Duration::seconds(180)),
        }
    }

    /// Staleness window
    pub fn overdue_window(&self) -> chrono::Duration {
        self.overdue_window
    }

    /// Whether `sample` may still be trusted at `now`
    pub fn is_fresh(&self, sample: &LoadSample, now: DateTime<Utc>) -> bool {
        sample.age_at(now) <= self.overdue_window
    }

    /// Copy out the sample for `node_name`, fresh or not
    pub fn get(&self, node_name: &str) -> Option<LoadSample> {
        self.entries.read().get(node_name).cloned()
    }

    /// Copy out the sample for `node_name` only if it is fresh at `now`
    pub fn get_fresh(&self, node_name: &str, now: DateTime<Utc>) -> Option<LoadSample> {
        self.get(node_name)
            .filter(|sample| self.is_fresh(sample, now))
    }

    /// Insert or replace the sample for its node
    pub fn insert(&self, sample: LoadSample) {
        self.entries.write().insert(sample.node_name.clone(), sample);
    }

    /// Remove the sample for `node_name`
    pub fn remove(&self, node_name: &str) -> Option<LoadSample> {
        self.entries.write().remove(node_name)
    }

    /// Drop every entry older than the staleness window at `now`
    pub fn evict_overdue(&self, now: DateTime<Utc>) -> EvictionOutcome {
        let mut entries = self.entries.write();
        let mut evicted = Vec::new();

        entries.retain(|_, sample| {
            if sample.age_at(now) > self.overdue_window {
                evicted.push(sample.clone());
                false
            } else {
                true
            }
        });

        let remaining = entries.len();
        drop(entries);

        for sample in &evicted {
            info!("Evicted overdue sample from cache: {}", sample);
        }
        debug!(
            "Eviction sweep removed {} entries, {} remaining",
            evicted.len(),
            remaining
        );

        EvictionOutcome { evicted, remaining }
    }

    /// Number of cached nodes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Point-in-time copy of every entry, sorted by node name
    pub fn snapshot(&self) -> Vec<LoadSample> {
        let mut samples: Vec<LoadSample> = self.entries.read().values().cloned().collect();
        samples.sort_by(|a, b| a.node_name.cmp(&b.node_name));
        samples
    }
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(DEFAULT_OVERDUE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aged(node: &str, value: i64, age_secs: i64) -> LoadSample {
        LoadSample::new(node, value, Utc::now() - chrono::Duration::seconds(age_secs))
    }

    #[test]
    fn test_insert_replaces_whole_sample() {
        let cache = MetricsCache::default();
        cache.insert(aged("node1", 40, 100));
        let fresh = aged("node1", 90, 0);
        cache.insert(fresh.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("node1"), Some(fresh));
    }

    #[test]
    fn test_get_fresh_respects_window() {
        let cache = MetricsCache::new(Duration::from_secs(180));
        cache.insert(aged("young", 85, 10));
        cache.insert(aged("old", 85, 200));

        let now = Utc::now();
        assert!(cache.get_fresh("young", now).is_some());
        assert!(cache.get_fresh("old", now).is_none());
        // Stale entries stay readable until swept
        assert!(cache.get("old").is_some());
        assert!(cache.get_fresh("missing", now).is_none());
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let cache = MetricsCache::new(Duration::from_secs(180));
        let now = Utc::now();
        let sample = LoadSample::new("edge", 90, now - chrono::Duration::seconds(180));
        assert!(cache.is_fresh(&sample, now));

        let sample = LoadSample::new("edge", 90, now - chrono::Duration::seconds(181));
        assert!(!cache.is_fresh(&sample, now));
    }

    #[test]
    fn test_evict_overdue() {
        let cache = MetricsCache::new(Duration::from_secs(180));
        cache.insert(aged("keep", 50, 30));
        cache.insert(aged("drop-a", 95, 181));
        cache.insert(aged("drop-b", 10, 3600));

        let outcome = cache.evict_overdue(Utc::now());

        assert_eq!(outcome.remaining, 1);
        let mut evicted: Vec<_> = outcome.evicted.iter().map(|s| s.node_name.as_str()).collect();
        evicted.sort();
        assert_eq!(evicted, vec!["drop-a", "drop-b"]);
        assert!(cache.get("keep").is_some());
        assert!(cache.get("drop-a").is_none());
    }

    #[test]
    fn test_snapshot_is_sorted_copy() {
        let cache = MetricsCache::default();
        cache.insert(aged("node-b", 20, 0));
        cache.insert(aged("node-a", 10, 0));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].node_name, "node-a");
        assert_eq!(snapshot[1].node_name, "node-b");

        cache.remove("node-a");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_display_format() {
        let observed = DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let sample = LoadSample::new("node1", 72, observed);
        assert_eq!(
            sample.to_string(),
            "nodeName:node1; memoryValue:72; checkTime:2024-05-01 08:30:00;"
        );
    }
}
