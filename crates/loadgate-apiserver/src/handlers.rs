use crate::{AppState, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use loadgate_scheduler::{ExtenderArgs, ExtenderFilterResult, HostPriorityList};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

const JSON_CONTENT_TYPE: &str = "application/json";
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// GET /
pub async fn index() -> &'static str {
    "Welcome to loadgate!\n"
}

/// GET /healthcheck
pub async fn healthcheck() -> &'static str {
    "OK\n"
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        state.metrics.render(),
    )
        .into_response()
}

/// POST /filter
///
/// Undecodable bodies still answer 200, with the decode error in the result's
/// `error` field so the scheduler treats the call as failed.
pub async fn filter(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let started = Instant::now();
    state.metrics.predicate_attempts.fetch_add(1, Ordering::Relaxed);
    log_body(&state, "filter", &body);

    let result = match serde_json::from_slice::<ExtenderArgs>(&body) {
        Ok(args) => {
            let scheduler = state.scheduler.clone();
            tokio::task::spawn_blocking(move || scheduler.filter(&args)).await?
        }
        Err(e) => {
            error!("Failed to decode filter request: {}", e);
            ExtenderFilterResult::error(e.to_string())
        }
    };

    let encoded = serde_json::to_vec(&result)?;
    state.metrics.predicate_successes.fetch_add(1, Ordering::Relaxed);
    state.metrics.predicate_duration.observe(started.elapsed());

    Ok(json_response(encoded))
}

/// POST /prioritize
///
/// Undecodable bodies answer 200 with an empty priority list.
pub async fn prioritize(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let started = Instant::now();
    state.metrics.priority_attempts.fetch_add(1, Ordering::Relaxed);
    log_body(&state, "prioritize", &body);

    let result: HostPriorityList = match serde_json::from_slice::<ExtenderArgs>(&body) {
        Ok(args) => {
            let scheduler = state.scheduler.clone();
            tokio::task::spawn_blocking(move || scheduler.prioritize(&args)).await?
        }
        Err(e) => {
            error!("Failed to decode prioritize request: {}", e);
            Vec::new()
        }
    };

    let encoded = serde_json::to_vec(&result)?;
    state.metrics.priority_successes.fetch_add(1, Ordering::Relaxed);
    state.metrics.priority_duration.observe(started.elapsed());

    Ok(json_response(encoded))
}

fn log_body(state: &AppState, route: &str, body: &[u8]) {
    if state.log_request_body {
        info!("{} request body: {}", route, String::from_utf8_lossy(body));
    }
}

fn json_response(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}
