//! Job submission and polling handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::error::{WorkerError, WorkerResult};
use crate::models::{AnalyzeRequest, Job, JobFilter, JobKind, JobRequest, JobStatus, LrcRequest};

/// Page size when `limit` is absent
pub const DEFAULT_LIST_LIMIT: u32 = 50;

/// Largest accepted `limit`
pub const MAX_LIST_LIMIT: u32 = 500;

pub fn jobs_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_jobs))
        .route("/analyze", post(submit_analyze))
        .route("/lrc", post(submit_lrc))
        .route("/:id", get(get_job))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

impl ListJobsQuery {
    fn into_filter(self) -> WorkerResult<JobFilter> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<JobStatus>)
            .transpose()
            .map_err(WorkerError::InvalidPayload)?;
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<JobKind>)
            .transpose()
            .map_err(WorkerError::InvalidPayload)?;
        let limit = self
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);

        Ok(JobFilter {
            status,
            kind,
            limit: Some(limit),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobList {
    pub jobs: Vec<Job>,
    pub count: usize,
}

async fn submit(state: &AppState, request: JobRequest) -> WorkerResult<impl IntoResponse> {
    let job = state.queue.submit(request).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

async fn submit_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> WorkerResult<impl IntoResponse> {
    submit(&state, request.into()).await
}

async fn submit_lrc(
    State(state): State<AppState>,
    Json(request): Json<LrcRequest>,
) -> WorkerResult<impl IntoResponse> {
    submit(&state, request.into()).await
}

async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> WorkerResult<Json<Job>> {
    state
        .queue
        .get_job(id)
        .await?
        .map(Json)
        .ok_or(WorkerError::NotFound(id))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> WorkerResult<Json<JobList>> {
    let filter = query.into_filter()?;
    let jobs = state.queue.list_jobs(&filter).await?;
    Ok(Json(JobList {
        count: jobs.len(),
        jobs,
    }))
}
