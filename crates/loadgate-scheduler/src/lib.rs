//! Loadgate Scheduler - scheduler extender decision engine
//!
//! This crate provides:
//! - Extender wire types (ExtenderArgs, filter result, host priorities)
//! - Predicate and priority traits with an ordered registry
//! - Memory-load predicate and priority backed by the metrics cache
//! - Bounded-concurrency filter and prioritize engines

// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

pub mod error;
pub mod filter;
pub mod parallel;
pub mod registry;
pub mod scheduler;
pub mod score;
pub mod types;

// Re-export commonly used types
pub use error::{Result, SchedulerError};
pub use filter::{MemoryLoadPredicate, Predicate};
pub use registry::AlgorithmRegistry;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use score::{MemoryLoadPriority, Priority};
pub use types::{
    ExtenderArgs, ExtenderFilterResult, HostPriority, HostPriorityList, PredicateOutcome,
    MAX_EXTENDER_PRIORITY, MIN_EXTENDER_PRIORITY, NEUTRAL_SCORE,
};
