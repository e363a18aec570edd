use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::attachment_disposition;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use convertr_core::AppError;
use convertr_processing::mime::content_type_for;
use std::sync::Arc;
use uuid::Uuid;

/// Stream a completed job's converted output
#[tracing::instrument(skip(state))]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpAppError> {
    let tracked = state
        .worker
        .jobs
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

    let (Some(key), Some(handle), Some(target)) = (
        tracked.output_key.as_deref(),
        tracked.job.download_handle(),
        tracked.job.target_format(),
    ) else {
        return Err(AppError::NotFound(format!("Job {} has no converted output", id)).into());
    };

    let length = state.worker.storage.content_length(key).await?;
    let stream = state.worker.storage.get_stream(key).await?;

    tracing::debug!(job_id = %id, bytes = length, "Serving converted output");

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(target))
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&handle.file_name),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)).into())
}
