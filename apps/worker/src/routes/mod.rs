//! HTTP surface of the worker
//!
//! - `POST /jobs/analyze`, `POST /jobs/lrc` - submit a job
//! - `GET /jobs/:id`, `GET /jobs` - poll jobs
//! - `GET /health`, `/health/live`, `/health/ready` - probes

pub mod health;
pub mod jobs;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use health::health_router;
pub use jobs::jobs_router;

use crate::queue::JobQueue;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
}

impl AppState {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self { queue }
    }
}

/// Full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/jobs", jobs_router(state.clone()))
        .nest("/health", health_router(state))
        .layer(TraceLayer::new_for_http())
}
