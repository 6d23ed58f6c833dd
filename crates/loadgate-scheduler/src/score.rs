use crate::filter::CHECK_MEMORY_LOAD;
use crate::types::{MAX_EXTENDER_PRIORITY, MIN_EXTENDER_PRIORITY, NEUTRAL_SCORE};
use crate::Result;
use k8s_openapi::api::core::v1::Pod;
use loadgate_cache::MetricsCache;
use std::sync::Arc;
use tracing::debug;

/// Scoring function trait
pub trait Priority: Send + Sync {
    /// Score `node_name` for `pod`, already clamped to the extender bounds
    fn score(&self, pod: &Pod, node_name: &str) -> Result<i64>;

    /// Name of the scoring function
    fn name(&self) -> &str;
}

/// Clamp a raw score into `[MIN_EXTENDER_PRIORITY, MAX_EXTENDER_PRIORITY]`
pub fn clamp_score(score: i64) -> i64 {
    score.clamp(MIN_EXTENDER_PRIORITY, MAX_EXTENDER_PRIORITY)
}

/// Unweighted mean of per-scorer results, truncated toward zero
pub fn calculate_mean_score(scores: &[i64], scorer_count: usize) -> i64 {
    if scorer_count == 0 {
        return 0;
    }

    let total = scores.iter().fold(0i64, |acc, s| acc.saturating_add(*s));
    total / scorer_count as i64
}

/// Prefers nodes with more free memory
pub struct MemoryLoadPriority {
    cache: Arc<MetricsCache>,
}

impl MemoryLoadPriority {
    pub fn new(cache: Arc<MetricsCache>) -> Self {
        Self { cache }
    }
}

impl Priority for MemoryLoadPriority {
    fn score(&self, _pod: &Pod, node_name: &str) -> Result<i64> {
        // NOTE: unlike MemoryLoadPredicate this does not check freshness, so a
        // stale sample still counts until the eviction sweep removes it.
        let score = match self.cache.get(node_name) {
            Some(sample) => {
                let score = clamp_score(100i64.saturating_sub(sample.value) / 10);
                debug!(
                    "{} scored node {} at {} (memory usage {}%)",
                    CHECK_MEMORY_LOAD, node_name, score, sample.value
                );
                score
            }
            None => {
                debug!(
                    "{} has no sample for node {}, scoring {}",
                    CHECK_MEMORY_LOAD, node_name, NEUTRAL_SCORE
                );
                NEUTRAL_SCORE
            }
        };

        Ok(score)
    }

    fn name(&self) -> &str {
        CHECK_MEMORY_LOAD
    }
}
