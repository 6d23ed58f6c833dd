use crate::metrics::ServerMetrics;
use loadgate_scheduler::Scheduler;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Decision engine behind `/filter` and `/prioritize`
    pub scheduler: Arc<Scheduler>,

    /// Service metrics served on `/metrics`
    pub metrics: Arc<ServerMetrics>,

    /// Log every extender request body at info level
    pub log_request_body: bool,
}

impl AppState {
    /// Create a new AppState
    pub fn new(scheduler: Arc<Scheduler>, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            scheduler,
            metrics,
            log_request_body: false,
        }
    }

    /// Enable or disable request body logging
    pub fn with_request_body_logging(mut self, enabled: bool) -> Self {
        self.log_request_body = enabled;
        self
    }
}
