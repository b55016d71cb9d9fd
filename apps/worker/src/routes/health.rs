//! Health check handlers
//!
//! - `GET /health` - plain OK
//! - `GET /health/live` - process is up
//! - `GET /health/ready` - store reachable and queue dispatching

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use super::AppState;
use crate::queue::QueueStats;

pub fn health_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_probe))
        .route("/ready", get(readiness_probe))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: bool,
    pub queue: QueueStats,
}

async fn simple_health() -> &'static str {
    "OK"
}

async fn liveness_probe() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// 200 while the store answers and the queue is dispatching, 503 otherwise
async fn readiness_probe(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.queue.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Readiness: job store unreachable");
            false
        }
    };
    let queue = state.queue.stats();
    let ready = database && queue.started && !queue.stopped;

    let (status_code, status) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            database,
            queue,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simple_health() {
        assert_eq!(simple_health().await, "OK");
    }

    #[tokio::test]
    async fn test_liveness_probe() {
        let response = liveness_probe().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
