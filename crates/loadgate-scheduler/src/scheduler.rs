use crate::filter::pod_fits_on_node;
use crate::parallel::{build_pool, parallel_map, parallelize_until, DEFAULT_PARALLELISM};
use crate::registry::AlgorithmRegistry;
use crate::score::calculate_mean_score;
use crate::types::{
    ExtenderArgs, ExtenderFilterResult, HostPriority, HostPriorityList, NEUTRAL_SCORE,
};
use crate::{Result, SchedulerError};
use parking_lot::Mutex;
use rayon::ThreadPool;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of nodes evaluated concurrently per request
    pub parallelism: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

/// Extender decision engine
pub struct Scheduler {
    registry: AlgorithmRegistry,
    config: SchedulerConfig,
    pool: ThreadPool,
}

impl Scheduler {
    /// Create a new scheduler and start its worker pool
    pub fn new(registry: AlgorithmRegistry, config: SchedulerConfig) -> Result<Self> {
        let pool = build_pool(config.parallelism)?;
        info!(
            "Scheduler worker pool started with {} threads",
            pool.current_num_threads()
        );

        Ok(Self {
            registry,
            config,
            pool,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &AlgorithmRegistry {
        &self.registry
    }

    /// Filter the candidate nodes through every registered predicate.
    ///
    /// The first predicate error stops further node evaluations and turns the
    /// whole batch into an error with no surviving nodes.
    pub fn filter(&self, args: &ExtenderArgs) -> ExtenderFilterResult {
        let pod_key = args.pod_key();

        let node_names = match &args.node_names {
            Some(names) => names,
            None => {
                let err = SchedulerError::MissingNodeNames;
                error!("Cannot filter pod {}: {}", pod_key, err);
                return ExtenderFilterResult::error(err.to_string());
            }
        };

        debug!(
            "Pod {} has {} candidate nodes before filtering: {}",
            pod_key,
            node_names.len(),
            node_names.join(",")
        );

        if self.registry.predicate_order().is_empty() {
            debug!("No predicates registered, returning all nodes");
            return ExtenderFilterResult::new(node_names.clone(), HashMap::new());
        }

        let pod = args.pod.clone().unwrap_or_default();
        let token = CancellationToken::new();
        let survivors: Mutex<Vec<usize>> = Mutex::new(Vec::with_capacity(node_names.len()));
        let failed_nodes: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
        let first_error: Mutex<Option<SchedulerError>> = Mutex::new(None);

        parallelize_until(&self.pool, Some(&token), node_names.len(), |index| {
            let node_name = &node_names[index];

            match pod_fits_on_node(&self.registry, &pod, node_name) {
                Ok(outcome) if outcome.fits => survivors.lock().push(index),
                Ok(outcome) => {
                    if !outcome.reasons.is_empty() {
                        failed_nodes
                            .lock()
                            .insert(node_name.clone(), outcome.reasons.join(","));
                    }
                }
                Err(e) => {
                    let mut first_error = first_error.lock();
                    if first_error.is_none() {
                        *first_error = Some(e);
                    }
                    token.cancel();
                }
            }
        });

        if let Some(err) = first_error.into_inner() {
            error!("Filtering pod {} failed: {}", pod_key, err);
            return ExtenderFilterResult::error(err.to_string());
        }

        let mut survivors = survivors.into_inner();
        survivors.sort_unstable();
        let survivors: Vec<String> = survivors
            .into_iter()
            .map(|index| node_names[index].clone())
            .collect();

        debug!(
            "Pod {} has {} nodes after filtering: {}",
            pod_key,
            survivors.len(),
            survivors.join(",")
        );

        ExtenderFilterResult::new(survivors, failed_nodes.into_inner())
    }

    /// Score the candidate nodes with every registered priority.
    ///
    /// Each node's score is the mean of its priority scores. If any priority
    /// fails on any node, every node scores 0.
    pub fn prioritize(&self, args: &ExtenderArgs) -> HostPriorityList {
        let pod_key = args.pod_key();

        let node_names = match &args.node_names {
            Some(names) => names,
            None => {
                warn!(
                    "Pod {}: {}; scoring every node {}",
                    pod_key,
                    SchedulerError::MissingNodeNames,
                    NEUTRAL_SCORE
                );
                return args
                    .nodes
                    .iter()
                    .flat_map(|list| list.items.iter())
                    .map(|node| {
                        HostPriority::new(
                            node.metadata.name.clone().unwrap_or_default(),
                            NEUTRAL_SCORE,
                        )
                    })
                    .collect();
            }
        };

        debug!(
            "Prioritizing pod {} over nodes: {}",
            pod_key,
            node_names.join(",")
        );

        let order = self.registry.priority_order();
        if order.is_empty() {
            debug!("No priorities registered, every node scores {}", NEUTRAL_SCORE);
            return flat_scores(node_names, NEUTRAL_SCORE);
        }

        let pod = args.pod.clone().unwrap_or_default();
        let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());

        // rows[node][priority]; each worker scores one node with every priority
        let rows: Vec<Vec<i64>> = parallel_map(&self.pool, node_names.len(), |index| {
            let node_name = &node_names[index];

            order
                .iter()
                .map(|name| match self.registry.priority(name) {
                    Some(priority) => match priority.score(&pod, node_name) {
                        Ok(score) => score,
                        Err(e) => {
                            errors.lock().push(e.to_string());
                            0
                        }
                    },
                    None => 0,
                })
                .collect()
        });

        let errors = errors.into_inner();
        if !errors.is_empty() {
            error!(
                "Prioritizing pod {} failed, every node scores 0: {:?}",
                pod_key, errors
            );
            return flat_scores(node_names, 0);
        }

        node_names
            .iter()
            .zip(rows)
            .map(|(node_name, row)| {
                let score = calculate_mean_score(&row, order.len());
                debug!("Final score for pod {} on {}: {}", pod_key, node_name, score);
                HostPriority::new(node_name.clone(), score)
            })
            .collect()
    }
}

fn flat_scores(node_names: &[String], score: i64) -> HostPriorityList {
    node_names
        .iter()
        .map(|name| HostPriority::new(name.clone(), score))
        .collect()
}
