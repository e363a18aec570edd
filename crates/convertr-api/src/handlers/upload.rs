use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::upload::extract_multipart_files;
use axum::{
    extract::{Multipart, State},
    Json,
};
use convertr_core::models::{RejectedUpload, UploadResponse};
use convertr_processing::mime::content_type_for;
use convertr_storage::keys::upload_key;
use std::sync::Arc;

/// Accept one or more files. Each file is validated and stored on its own;
/// rejected files are listed in `errors` and never fail the request.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let raw_files = extract_multipart_files(multipart).await?;
    let received = raw_files.len();
    let report = state.validator.ingest(raw_files);

    let mut response = UploadResponse {
        files: Vec::with_capacity(report.accepted.len()),
        errors: report.rejected.iter().map(RejectedUpload::from).collect(),
    };

    for accepted in report.accepted {
        let file = accepted.file;
        let key = upload_key(file.id);
        let content_type = content_type_for(&file.source_format);

        match state
            .worker
            .storage
            .put(&key, accepted.data.to_vec(), content_type)
            .await
        {
            Ok(()) => {
                state.worker.uploads.insert(file.clone(), key);
                response.files.push(file);
            }
            Err(e) => {
                tracing::error!(file_id = %file.id, error = %e, "Failed to store upload");
                response.errors.push(RejectedUpload {
                    original_name: file.original_name,
                    code: "STORAGE_ERROR".to_string(),
                    message: "Failed to store file".to_string(),
                });
            }
        }
    }

    tracing::info!(
        received,
        accepted = response.files.len(),
        rejected = response.errors.len(),
        "Upload processed"
    );

    Ok(Json(response))
}
