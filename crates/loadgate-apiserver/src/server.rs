use crate::handlers::*;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8888)),
        }
    }
}

/// Scheduler extender HTTP server
pub struct ApiServer {
    config: Config,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: Config, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/healthcheck", get(healthcheck))
            .route("/metrics", get(metrics))
            // Extender endpoints
            .route("/filter", post(filter))
            .route("/prioritize", post(prioritize))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until the token is cancelled
    pub async fn run(self, token: CancellationToken) -> Result<(), std::io::Error> {
        let app = self.build_router();

        info!("Starting extender server on {}", self.config.listen_addr);

        let listener = TcpListener::bind(self.config.listen_addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;

        info!("Extender server stopped");
        Ok(())
    }
}
