use crate::registry::AlgorithmRegistry;
use crate::types::{pod_key, PredicateOutcome};
use crate::Result;
use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use loadgate_cache::MetricsCache;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Name of the built-in memory-load algorithms
pub const CHECK_MEMORY_LOAD: &str = "CheckMemoryLoad";

/// Reason reported for nodes rejected by [`MemoryLoadPredicate`]
pub const CHECK_MEMORY_LOAD_FAIL_MSG: &str = "node memory load high";

/// Filter predicate trait
pub trait Predicate: Send + Sync {
    /// Decide whether `pod` fits on `node_name`
    fn fits(&self, pod: &Pod, node_name: &str) -> Result<PredicateOutcome>;

    /// Name of the predicate
    fn name(&self) -> &str;
}

/// Rejects nodes whose fresh memory sample is at or above the threshold
pub struct MemoryLoadPredicate {
    cache: Arc<MetricsCache>,
    threshold: i64,
}

impl MemoryLoadPredicate {
    pub fn new(cache: Arc<MetricsCache>, threshold: i64) -> Self {
        Self { cache, threshold }
    }
}

impl Predicate for MemoryLoadPredicate {
    fn fits(&self, pod: &Pod, node_name: &str) -> Result<PredicateOutcome> {
        // No sample, or one older than the window, means the node is assumed healthy
        let Some(sample) = self.cache.get_fresh(node_name, Utc::now()) else {
            return Ok(PredicateOutcome::fit());
        };

        if sample.value >= self.threshold {
            info!(
                "Pod {} cannot be scheduled on node {}: memory usage {}% >= {}%",
                pod_key(pod),
                node_name,
                sample.value,
                self.threshold
            );
            return Ok(PredicateOutcome::unfit(CHECK_MEMORY_LOAD_FAIL_MSG));
        }

        Ok(PredicateOutcome::fit())
    }

    fn name(&self) -> &str {
        CHECK_MEMORY_LOAD
    }
}

/// Run the registered predicates for one node in order, stopping at the
/// first one that rejects it. A predicate error aborts the node.
pub fn pod_fits_on_node(
    registry: &AlgorithmRegistry,
    pod: &Pod,
    node_name: &str,
) -> Result<PredicateOutcome> {
    for name in registry.predicate_order() {
        let Some(predicate) = registry.predicate(name) else {
            continue;
        };

        let outcome = predicate.fits(pod, node_name).map_err(|e| {
            error!("Predicate {} failed on node {}: {}", name, node_name, e);
            e
        })?;

        if !outcome.fits {
            debug!(
                "Node {} filtered out by {}: {}",
                node_name,
                name,
                outcome.reasons.join(",")
            );
            return Ok(outcome);
        }
    }

    Ok(PredicateOutcome::fit())
}
