//! Health, metrics, and conversion endpoints
//!
//! - `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Are hooks loaded and webhooks registered?
//! - `/metrics` - Prometheus metrics in text format
//! - `/{crd_name}` - CRD conversion webhook

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing::info;

use super::metrics::SharedMetrics;
use super::shutdown::wait_for_signal;
use super::webhook::{handle_convert, Converter};

/// Shared readiness flag
///
/// Set once hooks are loaded and the webhooks are registered.
#[derive(Debug, Clone, Default)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark as not ready so Kubernetes stops routing requests here
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// State shared by all handlers
#[derive(Clone)]
pub struct ServerState {
    pub readiness: ReadinessState,
    pub metrics: SharedMetrics,
    pub converter: Arc<Converter>,
}

impl ServerState {
    pub fn new(readiness: ReadinessState, metrics: SharedMetrics, converter: Arc<Converter>) -> Self {
        Self {
            readiness,
            metrics,
            converter,
        }
    }
}

/// Liveness probe handler
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler
///
/// Returns 200 OK if ready, 503 Service Unavailable if not.
async fn readyz(State(state): State<ServerState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

/// Build the router for health, metrics, and conversion endpoints
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
        .route("/{crd_name}", post(handle_convert))
        .with_state(state)
}

/// Run the server over plain HTTP until SIGTERM/SIGINT
pub async fn run_server(port: u16, state: ServerState) -> Result<(), std::io::Error> {
    let readiness = state.readiness.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = %port, "Conversion webhook server listening (HTTP)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal = wait_for_signal().await;
            info!(signal = signal, "Initiating graceful shutdown");
            readiness.set_not_ready();
        })
        .await
        .map_err(std::io::Error::other)
}

/// Run the server over HTTPS until SIGTERM/SIGINT
///
/// The API server only calls conversion webhooks over TLS.
pub async fn run_server_tls(
    port: u16,
    state: ServerState,
    tls_config: Arc<rustls::ServerConfig>,
) -> Result<(), std::io::Error> {
    use axum_server::tls_rustls::RustlsConfig;
    use axum_server::Handle;

    let readiness = state.readiness.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let config = RustlsConfig::from_config(tls_config);

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal = signal, "Initiating graceful shutdown");
        readiness.set_not_ready();
        shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
    });

    info!(port = %port, "Conversion webhook server listening (HTTPS)");

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
}

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;
