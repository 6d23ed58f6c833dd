use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while talking to the metrics backend
#[derive(Error, Debug, Diagnostic)]
pub enum CacheError {
    /// The HTTP client could not be built
    #[error("Invalid metrics client configuration: {message}")]
    #[diagnostic(
        code(loadgate::cache::invalid_config),
        help("Check --prometheus-url and --query-timeout-secs")
    )]
    InvalidConfig {
        #[allow(unused)]
        message: String,
    },

    /// The request never produced a response
    #[error("Metrics backend request failed: {message}")]
    #[diagnostic(
        code(loadgate::cache::backend_unreachable),
        help("Verify the metrics backend is reachable from this host")
    )]
    BackendUnreachable {
        #[allow(unused)]
        message: String,
    },

    /// The backend answered with a non-2xx status
    #[error("Metrics backend returned status {status}: {body}")]
    #[diagnostic(
        code(loadgate::cache::backend_status),
        help("Check the query expression and the backend logs")
    )]
    BackendStatus {
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// The body could not be decoded as a query result
    #[error("Malformed metrics backend response: {message}")]
    #[diagnostic(
        code(loadgate::cache::malformed_response),
        help("The backend must speak the Prometheus HTTP API (/api/v1/query)")
    )]
    MalformedResponse {
        #[allow(unused)]
        message: String,
    },

    /// The backend reported a non-success query status
    #[error("Metrics query '{query}' did not succeed (status: {status})")]
    #[diagnostic(
        code(loadgate::cache::query_failed),
        help("Run the query in the Prometheus UI to inspect the error")
    )]
    QueryFailed {
        #[allow(unused)]
        query: String,
        #[allow(unused)]
        status: String,
    },
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl CacheError {
    /// Create an InvalidConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a BackendUnreachable error
    pub fn backend_unreachable(message: impl Into<String>) -> Self {
        Self::BackendUnreachable {
            message: message.into(),
        }
    }

    /// Create a MalformedResponse error
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}
