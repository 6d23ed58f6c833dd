//! Loadgate API Server - scheduler extender HTTP endpoints
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - `/filter` and `/prioritize` extender endpoints
//! - Health check and welcome endpoints
//! - Prometheus `/metrics` for the service itself

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;

// Re-export commonly used types
pub use error::{ApiError, Result};
pub use metrics::ServerMetrics;
pub use server::{ApiServer, Config};
pub use state::AppState;
