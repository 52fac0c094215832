//! Axum server setup and router configuration.
//!
//! The HTTP surface is the push side of the engine: an external poller
//! fetches clan snapshots upstream and posts them here as JSON batches.

use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use donlog_core::events::{Snapshot, SnapshotBatch};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/ingest", post(ingest))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready check response.
#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    database: &'static str,
}

/// Readiness check - verifies the database answers queries.
async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                database: "up",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "not_ready",
                    database: "down",
                }),
            )
        }
    }
}

/// Ingest acknowledgment.
#[derive(Serialize)]
struct IngestResponse {
    accepted: usize,
}

/// Accept one poll cycle's snapshots and queue them for the ingestor.
///
/// Returns 202 once the batch is queued; 503 signals backpressure and the
/// poller should retry the cycle later. Queueing is fire-and-forget from
/// the poller's perspective - recording is idempotent, so a retried batch
/// never double-counts.
async fn ingest(
    State(state): State<AppState>,
    Json(snapshots): Json<Vec<Snapshot>>,
) -> impl IntoResponse {
    let accepted = snapshots.len();
    match state.batch_tx.try_send(SnapshotBatch { snapshots }) {
        Ok(()) => (StatusCode::ACCEPTED, Json(IngestResponse { accepted })).into_response(),
        Err(TrySendError::Full(_)) => {
            tracing::warn!("Snapshot channel full, rejecting batch");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(TrySendError::Closed(_)) => {
            tracing::error!("Snapshot channel closed, rejecting batch");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
