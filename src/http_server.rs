//! HTTP server implementation using Axum.

use crate::state::{AppState, StatusReport};
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Payload relayed when the request carries no usable JSON body.
pub fn default_payload() -> Value {
    json!({ "content": "Access received (no JSON body)" })
}

#[derive(Debug, Serialize)]
struct AccessResponse {
    status: &'static str,
    users_online: usize,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    total: usize,
}

/// Build the router (shared between `run_server` and tests).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/access", post(access))
        // Path used by already-deployed clients
        .route("/acesso", post(access))
        .route("/status", get(status))
        .route("/count", get(count))
        .route("/health", get(health))
        .route("/", get(root))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on the given port until `shutdown` resolves.
pub async fn run_server(
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn root() -> &'static str {
    "Access counter is running."
}

async fn access(State(state): State<AppState>, body: Bytes) -> Json<AccessResponse> {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| default_payload());

    let (id, users_online) = state.registry.register_and_count();
    info!(session = %id, users_online, "Access registered");

    if let Err(e) = state.relay.dispatch(payload) {
        warn!(session = %id, error = %e, "Access not relayed");
    }

    Json(AccessResponse {
        status: "ok",
        users_online,
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.registry.report())
}

async fn count(State(state): State<AppState>) -> Json<CountResponse> {
    Json(CountResponse {
        total: state.registry.sweep(),
    })
}
