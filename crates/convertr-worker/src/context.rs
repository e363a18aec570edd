//! Everything a worker needs to run one conversion

use bytes::Bytes;
use convertr_core::constants::API_PREFIX;
use convertr_core::models::{ConversionOptions, DownloadHandle, FormatTag, UploadedFile};
use convertr_core::AppError;
use convertr_processing::mime::content_type_for;
use convertr_processing::{ConversionInput, ConversionManager};
use convertr_storage::keys::output_key;
use convertr_storage::{Storage, StorageError};
use std::sync::Arc;
use uuid::Uuid;

use crate::registry::{JobRegistry, UploadRegistry};

/// Progress reported once the source bytes are loaded
pub const PROGRESS_LOADED: u8 = 25;
/// Progress reported once the converter has produced output
pub const PROGRESS_CONVERTED: u8 = 90;

#[derive(Debug, Clone)]
pub struct ConversionOutput {
    pub data: Bytes,
    pub file_name: String,
    pub content_type: &'static str,
}

pub(crate) fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(key) => AppError::NotFound(format!("Stored object {} not found", key)),
        StorageError::InvalidKey(msg) => AppError::BadRequest(msg),
        other => AppError::Storage(other.to_string()),
    }
}

#[derive(Clone)]
pub struct WorkerContext {
    pub storage: Arc<dyn Storage>,
    pub manager: ConversionManager,
    pub uploads: UploadRegistry,
    pub jobs: JobRegistry,
    public_base_url: String,
}

impl WorkerContext {
    pub fn new(
        storage: Arc<dyn Storage>,
        manager: ConversionManager,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            manager,
            uploads: UploadRegistry::new(),
            jobs: JobRegistry::new(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Where a finished job's output is served. Relative when no public base URL is set.
    pub fn download_url(&self, job_id: Uuid) -> String {
        format!(
            "{}{}/download/{}",
            self.public_base_url.trim_end_matches('/'),
            API_PREFIX,
            job_id
        )
    }

    /// Load the stored upload and run it through the converters. Touches no job state.
    pub async fn convert_file(
        &self,
        file: &UploadedFile,
        target: &FormatTag,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, AppError> {
        let upload = self
            .uploads
            .get(file.id)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file.id)))?;
        let data = self
            .storage
            .get(&upload.storage_key)
            .await
            .map_err(storage_error)?;

        let output = self
            .manager
            .convert(ConversionInput {
                data: Bytes::from(data),
                file_name: file.original_name.clone(),
                source: file.source_format.clone(),
                target: target.clone(),
                options: options.clone(),
            })
            .await?;

        Ok(ConversionOutput {
            data: output,
            file_name: file.output_name(target),
            content_type: content_type_for(target),
        })
    }

    /// Run a registered job to completion, recording each milestone on the job.
    /// Any failure is written to the job before it is returned.
    #[tracing::instrument(skip(self), fields(job.status = tracing::field::Empty))]
    pub async fn execute(&self, job_id: Uuid) -> Result<(), AppError> {
        let tracked = self
            .jobs
            .get(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
        let job = &tracked.job;
        let start = std::time::Instant::now();

        let result = match job.target_format() {
            Some(target) => self.run(job_id, job.file(), target, job.options()).await,
            None => Err(AppError::BadRequest("No target format selected".to_string())),
        };

        match result {
            Ok(()) => {
                tracing::Span::current().record("job.status", "success");
                tracing::info!(
                    job_id = %job_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Conversion job completed"
                );
                Ok(())
            }
            Err(e) => {
                tracing::Span::current().record("job.status", "failed");
                tracing::warn!(job_id = %job_id, error = %e, "Conversion job failed");
                if let Err(transition) = self.jobs.fail(job_id, e.to_string()) {
                    tracing::error!(
                        job_id = %job_id,
                        error = %transition,
                        "Failed to record job failure"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        job_id: Uuid,
        file: &UploadedFile,
        target: &FormatTag,
        options: &ConversionOptions,
    ) -> Result<(), AppError> {
        self.jobs.progress(job_id, PROGRESS_LOADED);
        let output = self.convert_file(file, target, options).await?;
        self.jobs.progress(job_id, PROGRESS_CONVERTED);

        let key = output_key(job_id);
        self.storage
            .put(&key, output.data.to_vec(), output.content_type)
            .await
            .map_err(storage_error)?;

        let handle = DownloadHandle {
            location: self.download_url(job_id),
            file_name: output.file_name,
        };
        self.jobs.complete(job_id, handle, key)?;
        Ok(())
    }
}
