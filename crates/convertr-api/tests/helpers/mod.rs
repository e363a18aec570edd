//! Test helpers: build AppState and router for integration tests.

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use convertr_api::setup::routes;
use convertr_api::AppState;
use convertr_core::constants::API_PREFIX;
use convertr_core::models::{JobStatus, JobStatusResponse, UploadResponse};
use convertr_core::Config;
use convertr_processing::converters::ArchiveConverter;
use convertr_processing::ConversionManager;
use convertr_storage::LocalStorage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

/// Server backed by a temp directory and the archive converter only, so
/// no external tools are needed
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(ConversionManager::new().with_converter(ArchiveConverter::new())).await
}

pub async fn setup_test_app_with(manager: ConversionManager) -> TestApp {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config {
        storage_path: temp_dir.path().to_string_lossy().into_owned(),
        max_file_size_bytes: 1024 * 1024,
        ..Config::default()
    };
    let storage = LocalStorage::new(temp_dir.path()).await.unwrap();
    let state = Arc::new(AppState::new(config.clone(), Arc::new(storage), manager));
    let router = routes::setup_routes(&config, state.clone()).unwrap();

    TestApp {
        server: TestServer::new(router).unwrap(),
        state,
        _temp_dir: temp_dir,
    }
}

pub fn file_part(name: &str, data: &[u8]) -> Part {
    Part::bytes(data.to_vec())
        .file_name(name)
        .mime_type("application/octet-stream")
}

pub async fn upload(server: &TestServer, name: &str, data: &[u8]) -> UploadResponse {
    let form = MultipartForm::new().add_part("file", file_part(name, data));
    let response = server.post(&api_path("/upload")).multipart(form).await;
    response.assert_status_ok();
    response.json::<UploadResponse>()
}

/// Poll the job endpoint until the job is completed or failed
pub async fn wait_for_job(server: &TestServer, job_id: Uuid) -> JobStatusResponse {
    for _ in 0..200 {
        let job = server
            .get(&api_path(&format!("/jobs/{}", job_id)))
            .await
            .json::<JobStatusResponse>();
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish in time", job_id);
}
