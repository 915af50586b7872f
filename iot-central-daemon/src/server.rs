// IoT Central Daemon - Collection daemon and self-metrics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HTTP endpoint for the self-metrics

use crate::metrics::SelfMetrics;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use iot_central::{ShutdownListener, ShutdownSignal};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    metrics: Arc<SelfMetrics>,
    started: Instant,
}

impl AppState {
    pub fn new(metrics: Arc<SelfMetrics>) -> Self {
        Self {
            metrics,
            started: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: ShutdownListener,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Metrics endpoint: http://{}/metrics", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.triggered().await })
        .await
}

/// Endpoint running in the background until [`stop`](Self::stop)
///
/// It has its own signal so the final counters stay scrapable while the
/// pipeline drains.
pub struct MetricsServer {
    stop: ShutdownSignal,
    task: JoinHandle<std::io::Result<()>>,
}

impl MetricsServer {
    pub fn spawn(listener: TcpListener, state: AppState) -> Self {
        let stop = ShutdownSignal::new();
        let task = tokio::spawn(serve(listener, state, stop.listener()));
        Self { stop, task }
    }

    /// Finish open requests and wait for the server to exit
    pub async fn stop(self) {
        self.stop.trigger();
        match self.task.await {
            Ok(Ok(())) => info!("Metrics endpoint stopped"),
            Ok(Err(e)) => error!(error = %e, "Metrics server failed"),
            Err(e) => error!(error = %e, "Metrics server task failed"),
        }
    }
}

/// Prometheus metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Health check handler.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: iot_central::VERSION,
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
