use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use crate::utils::upload::attachment_disposition;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use convertr_core::models::{
    BatchConvertItem, BatchConvertRequest, BatchConvertResponse, ConversionJob, ConvertAccepted,
    ConvertRequest, FormatTag,
};
use convertr_core::{AppError, ErrorMetadata};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvertMode {
    /// Queue the job and answer immediately with its id
    #[default]
    Async,
    /// Convert within the request and answer with the converted bytes
    Sync,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    #[serde(default)]
    mode: ConvertMode,
}

#[tracing::instrument(skip(state, request), fields(file_id = %request.file_id, target = %request.target_format))]
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
    ValidatedJson(request): ValidatedJson<ConvertRequest>,
) -> Result<Response, HttpAppError> {
    match query.mode {
        ConvertMode::Sync => convert_sync(&state, request).await,
        ConvertMode::Async => {
            let job_id = enqueue(&state, &request)?;
            Ok((StatusCode::ACCEPTED, Json(ConvertAccepted::processing(job_id))).into_response())
        }
    }
}

/// Queue several conversions. Each item succeeds or fails on its own.
#[tracing::instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn convert_batch(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BatchConvertRequest>,
) -> Result<Json<BatchConvertResponse>, HttpAppError> {
    if request.items.is_empty() {
        return Err(AppError::BadRequest("No items to convert".to_string()).into());
    }

    let jobs: Vec<BatchConvertItem> = request
        .items
        .iter()
        .map(|item| match enqueue(&state, item) {
            Ok(job_id) => BatchConvertItem {
                file_id: item.file_id,
                job_id: Some(job_id),
                status: "processing".to_string(),
                error: None,
            },
            Err(e) => {
                tracing::debug!(file_id = %item.file_id, error = %e, "Batch item rejected");
                BatchConvertItem {
                    file_id: item.file_id,
                    job_id: None,
                    status: "failed".to_string(),
                    error: Some(e.client_message()),
                }
            }
        })
        .collect();

    Ok(Json(BatchConvertResponse { jobs }))
}

/// Register a job for an uploaded file and hand it to the worker pool
fn enqueue(state: &AppState, request: &ConvertRequest) -> Result<Uuid, AppError> {
    let upload = state
        .worker
        .uploads
        .get(request.file_id)
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", request.file_id)))?;

    let job_id = state.worker.jobs.create(
        upload.file,
        FormatTag::new(&request.target_format),
        request.options.clone(),
    )?;

    if let Err(e) = state.queue.submit(job_id) {
        if let Err(transition) = state.worker.jobs.fail(job_id, e.to_string()) {
            tracing::error!(job_id = %job_id, error = %transition, "Failed to record rejected job");
        }
        return Err(e);
    }

    tracing::info!(job_id = %job_id, file_id = %request.file_id, "Conversion job queued");
    Ok(job_id)
}

async fn convert_sync(state: &AppState, request: ConvertRequest) -> Result<Response, HttpAppError> {
    let upload = state
        .worker
        .uploads
        .get(request.file_id)
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", request.file_id)))?;

    // Run the same checks a queued job would go through
    let mut job = ConversionJob::new(upload.file);
    job.select_target(FormatTag::new(&request.target_format))
        .map_err(AppError::from)?;
    if let Some(options) = request.options {
        job.set_options(options).map_err(AppError::from)?;
    }
    let target = job
        .target_format()
        .cloned()
        .ok_or_else(|| AppError::BadRequest("No target format selected".to_string()))?;

    let output = state
        .worker
        .convert_file(job.file(), &target, job.options())
        .await?;

    tracing::info!(
        file_id = %request.file_id,
        target = %target,
        output_bytes = output.data.len(),
        "Synchronous conversion completed"
    );

    Ok((
        [
            (header::CONTENT_TYPE, output.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                attachment_disposition(&output.file_name),
            ),
        ],
        output.data,
    )
        .into_response())
}
