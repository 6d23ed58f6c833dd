//! Loadgate Cache - node memory-load samples fetched from Prometheus
//!
//! This crate provides:
//! - An in-memory, lock-guarded cache of per-node load samples
//! - A Prometheus instant-query client
//! - Background refresh and eviction loops
//! - Observer hooks for fetch and cache-size reporting

// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod cache;
pub mod error;
pub mod prometheus;
pub mod refresher;

// Re-export commonly used types
pub use cache::{EvictionOutcome, LoadSample, MetricsCache, DEFAULT_OVERDUE_WINDOW};
pub use error::{CacheError, Result};
pub use prometheus::{PrometheusClient, QueryResponse};
pub use refresher::{CacheConfig, CacheObserver, CacheRefresher, NoopObserver};
