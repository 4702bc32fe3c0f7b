//! Query API (C9): a read-only HTTP surface over the Store, for an
//! external dashboard or CLI to poll. Never writes; all mutation goes
//! through the orchestrator's ingestion and cycle workers.

#![warn(missing_docs)]

pub mod handlers;
pub mod state;

use axum::routing::get;
use axum::Router;
use state::ApiState;
use std::net::SocketAddr;
use std::sync::Arc;

/// Build the query API router.
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/verdicts/recent", get(handlers::recent_verdicts))
        .route("/api/v1/alerts/ml/recent", get(handlers::recent_ml_alerts))
        .route("/api/v1/training/history", get(handlers::training_history))
        .route("/api/v1/model/status", get(handlers::model_status))
        .route("/api/v1/hosts/:src_ip/baseline", get(handlers::host_baseline))
        .route("/api/v1/hosts/:src_ip/alerts", get(handlers::host_signature_alerts))
        .route("/api/v1/hosts", get(handlers::recent_hosts))
        .layer(axum::Extension(state))
}

/// Serve the query API on `addr` until the process is killed.
pub async fn serve(addr: SocketAddr, state: Arc<ApiState>) -> std::io::Result<()> {
    let app = build_router(state);
    tracing::info!(%addr, "nids query API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
