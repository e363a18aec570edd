use crate::state::AppState;
use axum::{extract::State, Json};
use convertr_processing::CacheStats;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub converters: Vec<&'static str>,
    pub jobs: usize,
    pub uploads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

/// Liveness plus a snapshot of in-memory state
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let worker = &state.worker;
    Json(HealthResponse {
        status: "alive",
        version: env!("CARGO_PKG_VERSION"),
        storage: worker.storage.backend_name(),
        converters: worker.manager.converter_names(),
        jobs: worker.jobs.len(),
        uploads: worker.uploads.len(),
        cache: worker.manager.cache_stats(),
    })
}
