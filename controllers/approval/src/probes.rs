//! Health probes and metrics endpoint.
//!
//! - `GET /healthz`: liveness, always 200
//! - `GET /readyz`: 200 once the approval watcher has started, 503 before
//! - `GET /metrics`: Prometheus text format

use crate::error::ControllerError;
use crate::metrics::Metrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Shared state behind the probe routes.
#[derive(Clone)]
pub struct ProbeState {
    /// Set once the approval watcher is running
    pub ready: Arc<AtomicBool>,
    /// Counters rendered on `/metrics`
    pub metrics: Arc<Metrics>,
}

/// Routes for the probe and metrics endpoints.
pub fn router(state: ProbeState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the probe routes on `addr` until the process exits.
pub async fn serve(addr: SocketAddr, state: ProbeState) -> Result<(), ControllerError> {
    let listener = TcpListener::bind(addr).await?;
    info!("Probe server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<ProbeState>) -> Response {
    if state.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting").into_response()
    }
}

async fn metrics(State(state): State<ProbeState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
