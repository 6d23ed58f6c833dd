use miette::Diagnostic;
use thiserror::Error;

/// Scheduler error type
#[derive(Error, Debug, Diagnostic)]
pub enum SchedulerError {
    /// The request carried full node objects instead of node names
    #[error("Request has no node names; only nodeCacheCapable: true is supported")]
    #[diagnostic(
        code(scheduler::missing_node_names),
        help("Set nodeCacheCapable: true for this extender in the scheduler configuration")
    )]
    MissingNodeNames,

    /// An algorithm failed while evaluating one node
    #[error("Algorithm {algorithm} failed on node {node_name}: {message}")]
    #[diagnostic(
        code(scheduler::algorithm_failed),
        help("The whole batch is rejected; check the algorithm's inputs for this node")
    )]
    AlgorithmFailed {
        algorithm: String,
        node_name: String,
        message: String,
    },

    /// Two algorithms of the same kind share a name
    #[error("{kind} algorithm {name} is already registered")]
    #[diagnostic(
        code(scheduler::duplicate_algorithm),
        help("Algorithm names must be unique per kind")
    )]
    DuplicateAlgorithm { kind: String, name: String },

    /// The per-request worker pool could not be started
    #[error("Failed to build worker pool with {workers} threads: {message}")]
    #[diagnostic(
        code(scheduler::worker_pool),
        help("Lower --parallelism or check the process thread limits")
    )]
    WorkerPool { workers: usize, message: String },
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Create an AlgorithmFailed error
    pub fn algorithm_failed(
        algorithm: impl Into<String>,
        node_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::AlgorithmFailed {
            algorithm: algorithm.into(),
            node_name: node_name.into(),
            message: message.into(),
        }
    }

    /// Create a DuplicateAlgorithm error
    pub fn duplicate_algorithm(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateAlgorithm {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a WorkerPool error
    pub fn worker_pool(workers: usize, message: impl Into<String>) -> Self {
        Self::WorkerPool {
            workers,
            message: message.into(),
        }
    }
}
