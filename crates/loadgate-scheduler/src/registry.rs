use crate::filter::{MemoryLoadPredicate, Predicate, CHECK_MEMORY_LOAD};
use crate::score::{MemoryLoadPriority, Priority};
use crate::{Result, SchedulerError};
use loadgate_cache::MetricsCache;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Named predicates and priorities plus the order they run in.
///
/// Registering an algorithm appends its name to the matching order list. The
/// order can be replaced afterwards; names with no registered algorithm are
/// skipped by the filter engine and score zero in the prioritize engine.
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    predicates: HashMap<String, Arc<dyn Predicate>>,
    predicate_order: Vec<String>,
    priorities: HashMap<String, Arc<dyn Priority>>,
    priority_order: Vec<String>,
}

impl AlgorithmRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the memory-load predicate and priority
    pub fn with_memory_load(cache: Arc<MetricsCache>, threshold: i64) -> Self {
        let mut registry = Self::new();
        registry.predicates.insert(
            CHECK_MEMORY_LOAD.to_string(),
            Arc::new(MemoryLoadPredicate::new(cache.clone(), threshold)),
        );
        registry.predicate_order.push(CHECK_MEMORY_LOAD.to_string());
        registry.priorities.insert(
            CHECK_MEMORY_LOAD.to_string(),
            Arc::new(MemoryLoadPriority::new(cache)),
        );
        registry.priority_order.push(CHECK_MEMORY_LOAD.to_string());
        registry
    }

    /// Register a predicate at the end of the evaluation order
    pub fn register_predicate(&mut self, predicate: Arc<dyn Predicate>) -> Result<()> {
        let name = predicate.name().to_string();
        if self.predicates.contains_key(&name) {
            return Err(SchedulerError::duplicate_algorithm("Predicate", name));
        }

        self.predicates.insert(name.clone(), predicate);
        self.predicate_order.push(name);
        Ok(())
    }

    /// Register a priority at the end of the aggregation order
    pub fn register_priority(&mut self, priority: Arc<dyn Priority>) -> Result<()> {
        let name = priority.name().to_string();
        if self.priorities.contains_key(&name) {
            return Err(SchedulerError::duplicate_algorithm("Priority", name));
        }

        self.priorities.insert(name.clone(), priority);
        self.priority_order.push(name);
        Ok(())
    }

    /// Replace the predicate evaluation order
    pub fn set_predicate_order(&mut self, order: Vec<String>) {
        for name in order.iter().filter(|n| !self.predicates.contains_key(*n)) {
            warn!("Predicate {} is not registered and will be skipped", name);
        }
        self.predicate_order = order;
    }

    /// Replace the priority aggregation order
    pub fn set_priority_order(&mut self, order: Vec<String>) {
        for name in order.iter().filter(|n| !self.priorities.contains_key(*n)) {
            warn!("Priority {} is not registered and will score 0", name);
        }
        self.priority_order = order;
    }

    pub fn predicate_order(&self) -> &[String] {
        &self.predicate_order
    }

    pub fn priority_order(&self) -> &[String] {
        &self.priority_order
    }

    pub fn predicate(&self, name: &str) -> Option<&Arc<dyn Predicate>> {
        self.predicates.get(name)
    }

    pub fn priority(&self, name: &str) -> Option<&Arc<dyn Priority>> {
        self.priorities.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_memory_load() {
        let registry = AlgorithmRegistry::with_memory_load(Arc::new(MetricsCache::default()), 80);

        assert_eq!(registry.predicate_order(), [CHECK_MEMORY_LOAD.to_string()]);
        assert_eq!(registry.priority_order(), [CHECK_MEMORY_LOAD.to_string()]);
        assert!(registry.predicate(CHECK_MEMORY_LOAD).is_some());
        assert!(registry.priority(CHECK_MEMORY_LOAD).is_some());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let cache = Arc::new(MetricsCache::default());
        let mut registry = AlgorithmRegistry::with_memory_load(cache.clone(), 80);

        let err = registry
            .register_predicate(Arc::new(MemoryLoadPredicate::new(cache.clone(), 90)))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateAlgorithm { .. }));

        let err = registry
            .register_priority(Arc::new(MemoryLoadPriority::new(cache)))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateAlgorithm { .. }));
        assert_eq!(registry.predicate_order().len(), 1);
    }

    #[test]
    fn test_set_order() {
        let mut registry =
            AlgorithmRegistry::with_memory_load(Arc::new(MetricsCache::default()), 80);
        registry.set_predicate_order(Vec::new());
        registry.set_priority_order(vec!["Unknown".to_string(), CHECK_MEMORY_LOAD.to_string()]);

        assert!(registry.predicate_order().is_empty());
        assert_eq!(registry.priority_order().len(), 2);
        assert!(registry.priority("Unknown").is_none());
    }
}
