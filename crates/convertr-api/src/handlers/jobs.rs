use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use convertr_core::models::{JobListResponse, JobStatusResponse};
use convertr_core::AppError;
use std::sync::Arc;
use uuid::Uuid;

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, HttpAppError> {
    let tracked = state
        .worker
        .jobs
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
    Ok(Json(tracked.status_response()))
}

/// All known jobs, newest first
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    let jobs = state.worker.jobs.list();
    Json(JobListResponse {
        count: jobs.len(),
        jobs,
    })
}
