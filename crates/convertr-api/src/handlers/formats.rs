use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use convertr_core::models::{lookup_targets, FormatTag, SupportedFormatsResponse};
use convertr_core::AppError;
use std::sync::Arc;

/// Legal targets for a source format, straight from the capability table
pub async fn supported_formats(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<SupportedFormatsResponse>, HttpAppError> {
    let source_format = FormatTag::new(&source);
    if source_format.as_str().is_empty() {
        return Err(AppError::BadRequest("Source format must not be empty".to_string()).into());
    }

    let category = source_format.category();
    if state.config.strict_formats && !category.is_known() {
        return Err(AppError::UnsupportedFormat(format!(
            "{} is not a recognized format",
            source_format
        ))
        .into());
    }

    Ok(Json(SupportedFormatsResponse {
        supported_formats: lookup_targets(&source_format),
        category,
        source_format,
    }))
}
