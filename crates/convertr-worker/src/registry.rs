//! In-memory registries for uploaded files and conversion jobs
//!
//! Both are cheap to clone and share one map behind a `RwLock`. Every job
//! state change is also published on a broadcast channel so push
//! subscribers (SSE) see it without polling.

use chrono::{DateTime, Utc};
use convertr_core::models::{
    ConversionJob, ConversionOptions, DownloadHandle, FormatTag, JobStatus, JobStatusResponse,
    StatusMessage, TransitionError, UploadedFile,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file: UploadedFile,
    pub storage_key: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct UploadRegistry {
    uploads: Arc<RwLock<HashMap<Uuid, StoredUpload>>>,
}

impl UploadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: UploadedFile, storage_key: String) {
        let upload = StoredUpload {
            file,
            storage_key,
            uploaded_at: Utc::now(),
        };
        self.uploads.write().insert(upload.file.id, upload);
    }

    pub fn get(&self, file_id: Uuid) -> Option<StoredUpload> {
        self.uploads.read().get(&file_id).cloned()
    }

    pub fn remove(&self, file_id: Uuid) -> Option<StoredUpload> {
        self.uploads.write().remove(&file_id)
    }

    pub fn len(&self) -> usize {
        self.uploads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove uploads older than `cutoff` that no live job still references
    pub fn prune(&self, cutoff: DateTime<Utc>, in_use: &dyn Fn(Uuid) -> bool) -> Vec<StoredUpload> {
        let mut uploads = self.uploads.write();
        let stale: Vec<Uuid> = uploads
            .values()
            .filter(|u| u.uploaded_at < cutoff && !in_use(u.file.id))
            .map(|u| u.file.id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| uploads.remove(&id))
            .collect()
    }
}

/// A status change for one job, as fanned out to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUpdate {
    pub job_id: Uuid,
    pub message: StatusMessage,
}

#[derive(Debug, Clone)]
pub struct TrackedJob {
    pub job: ConversionJob,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output_key: Option<String>,
}

impl TrackedJob {
    pub fn status_response(&self) -> JobStatusResponse {
        let file = self.job.file();
        let handle = self.job.download_handle();
        JobStatusResponse {
            id: self.job.id(),
            file_id: file.id,
            original_name: file.original_name.clone(),
            source_format: file.source_format.clone(),
            target_format: self.job.target_format().cloned(),
            status: self.job.status(),
            progress: self.job.progress(),
            download_url: handle.map(|h| h.location.clone()),
            file_name: handle.map(|h| h.file_name.clone()),
            error: self.job.error_detail().map(str::to_string),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    pub fn status_message(&self) -> StatusMessage {
        self.status_response().to_message()
    }

    pub fn is_finished(&self) -> bool {
        self.job.status().is_terminal()
    }
}

#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, TrackedJob>>>,
    updates: broadcast::Sender<JobUpdate>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            updates,
        }
    }

    /// Register a new job for `file` and move it straight to converting
    pub fn create(
        &self,
        file: UploadedFile,
        target: FormatTag,
        options: Option<ConversionOptions>,
    ) -> Result<Uuid, TransitionError> {
        let mut job = ConversionJob::with_id(Uuid::new_v4(), file);
        job.select_target(target)?;
        if let Some(options) = options {
            job.set_options(options)?;
        }
        job.start()?;

        let id = job.id();
        self.jobs.write().insert(
            id,
            TrackedJob {
                job,
                created_at: Utc::now(),
                completed_at: None,
                output_key: None,
            },
        );
        self.publish(id, StatusMessage::progress(0));
        Ok(id)
    }

    pub fn get(&self, job_id: Uuid) -> Option<TrackedJob> {
        self.jobs.read().get(&job_id).cloned()
    }

    pub fn contains(&self, job_id: Uuid) -> bool {
        self.jobs.read().contains_key(&job_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.updates.subscribe()
    }

    fn publish(&self, job_id: Uuid, message: StatusMessage) {
        // No subscribers is fine
        let _ = self.updates.send(JobUpdate { job_id, message });
    }

    fn modify<R>(
        &self,
        job_id: Uuid,
        f: impl FnOnce(&mut TrackedJob) -> Result<R, TransitionError>,
    ) -> Option<Result<(R, StatusMessage), TransitionError>> {
        let mut jobs = self.jobs.write();
        let tracked = jobs.get_mut(&job_id)?;
        Some(f(tracked).map(|r| (r, tracked.status_message())))
    }

    pub fn progress(&self, job_id: Uuid, percent: u8) {
        match self.modify(job_id, |t| t.job.advance(percent)) {
            Some(Ok((true, message))) => self.publish(job_id, message),
            Some(Ok((false, _))) | None => {}
            Some(Err(e)) => {
                tracing::debug!(job_id = %job_id, error = %e, "Ignoring progress update");
            }
        }
    }

    pub fn complete(
        &self,
        job_id: Uuid,
        handle: DownloadHandle,
        output_key: String,
    ) -> Result<(), TransitionError> {
        let outcome = self.modify(job_id, |t| {
            t.job.succeed(handle)?;
            t.completed_at = Some(Utc::now());
            t.output_key = Some(output_key);
            Ok(())
        });
        self.finish(job_id, outcome)
    }

    pub fn fail(&self, job_id: Uuid, detail: impl Into<String>) -> Result<(), TransitionError> {
        let detail = detail.into();
        let outcome = self.modify(job_id, |t| {
            t.job.fail(detail)?;
            t.completed_at = Some(Utc::now());
            Ok(())
        });
        self.finish(job_id, outcome)
    }

    fn finish(
        &self,
        job_id: Uuid,
        outcome: Option<Result<((), StatusMessage), TransitionError>>,
    ) -> Result<(), TransitionError> {
        match outcome {
            Some(Ok(((), message))) => {
                self.publish(job_id, message);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => {
                tracing::debug!(job_id = %job_id, "Job vanished before it finished");
                Ok(())
            }
        }
    }

    /// Every job, newest first
    pub fn list(&self) -> Vec<JobStatusResponse> {
        let mut jobs: Vec<JobStatusResponse> = self
            .jobs
            .read()
            .values()
            .map(TrackedJob::status_response)
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Whether any job that has not finished still reads from this upload
    pub fn references_file(&self, file_id: Uuid) -> bool {
        self.jobs
            .read()
            .values()
            .any(|t| !t.is_finished() && t.job.file().id == file_id)
    }

    /// Remove finished jobs that completed before `cutoff`
    pub fn prune_finished(&self, cutoff: DateTime<Utc>) -> Vec<TrackedJob> {
        let mut jobs = self.jobs.write();
        let expired: Vec<Uuid> = jobs
            .iter()
            .filter(|(_, t)| t.is_finished() && t.completed_at.is_some_and(|at| at < cutoff))
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| jobs.remove(&id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn file(name: &str, format: &str) -> UploadedFile {
        UploadedFile::new(name, FormatTag::new(format), 10)
    }

    fn handle(job_id: Uuid) -> DownloadHandle {
        DownloadHandle {
            location: format!("/api/download/{job_id}"),
            file_name: "photo.jpg".to_string(),
        }
    }

    #[test]
    fn test_create_starts_job() {
        let registry = JobRegistry::new();
        let id = registry
            .create(file("photo.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();

        let tracked = registry.get(id).unwrap();
        assert_eq!(tracked.job.status(), JobStatus::Converting);
        assert_eq!(tracked.job.attempt(), 1);
        assert_ne!(id, tracked.job.file().id);
    }

    #[test]
    fn test_create_rejects_illegal_target() {
        let registry = JobRegistry::new();
        let err = registry
            .create(file("notes.txt", "txt"), FormatTag::new("mp3"), None)
            .unwrap_err();
        assert!(matches!(err, TransitionError::UnsupportedTarget { .. }));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_updates_are_broadcast_in_order() {
        let registry = JobRegistry::new();
        let mut rx = registry.subscribe();
        let id = registry
            .create(file("photo.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();

        registry.progress(id, 25);
        registry.progress(id, 10);
        registry.progress(id, 90);
        registry
            .complete(id, handle(id), format!("converted/{id}"))
            .unwrap();

        let mut messages = Vec::new();
        while let Ok(update) = rx.try_recv() {
            assert_eq!(update.job_id, id);
            messages.push(update.message);
        }
        assert_eq!(
            messages,
            vec![
                StatusMessage::progress(0),
                StatusMessage::progress(25),
                StatusMessage::progress(90),
                StatusMessage::completed(format!("/api/download/{id}"), "photo.jpg"),
            ]
        );
    }

    #[test]
    fn test_fail_records_detail() {
        let registry = JobRegistry::new();
        let id = registry
            .create(file("clip.mp4", "mp4"), FormatTag::new("mp3"), None)
            .unwrap();
        registry.fail(id, "ffmpeg exited with 1").unwrap();

        let response = registry.get(id).unwrap().status_response();
        assert_eq!(response.status, JobStatus::Failed);
        assert_eq!(response.progress, 0);
        assert_eq!(response.error.as_deref(), Some("ffmpeg exited with 1"));
        assert!(response.download_url.is_none());
        assert!(response.completed_at.is_some());
    }

    #[test]
    fn test_complete_twice_is_rejected() {
        let registry = JobRegistry::new();
        let id = registry
            .create(file("photo.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();
        registry.complete(id, handle(id), "k".to_string()).unwrap();
        assert!(registry.fail(id, "late").is_err());
        assert_eq!(registry.get(id).unwrap().job.status(), JobStatus::Completed);
    }

    #[test]
    fn test_list_newest_first() {
        let registry = JobRegistry::new();
        let first = registry
            .create(file("a.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = registry
            .create(file("b.png", "png"), FormatTag::new("gif"), None)
            .unwrap();

        let ids: Vec<Uuid> = registry.list().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn test_prune_finished_keeps_running_jobs() {
        let registry = JobRegistry::new();
        let running = registry
            .create(file("a.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();
        let done = registry
            .create(file("b.png", "png"), FormatTag::new("jpg"), None)
            .unwrap();
        registry.complete(done, handle(done), "k".to_string()).unwrap();

        let pruned = registry.prune_finished(Utc::now() + Duration::seconds(1));
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].job.id(), done);
        assert!(registry.contains(running));
        assert!(!registry.contains(done));
    }

    #[test]
    fn test_upload_prune_skips_referenced_files() {
        let uploads = UploadRegistry::new();
        let jobs = JobRegistry::new();
        let busy = file("a.png", "png");
        let idle = file("b.png", "png");
        uploads.insert(busy.clone(), "uploads/a".to_string());
        uploads.insert(idle.clone(), "uploads/b".to_string());
        jobs.create(busy.clone(), FormatTag::new("jpg"), None).unwrap();

        let pruned = uploads.prune(Utc::now() + Duration::seconds(1), &|id| {
            jobs.references_file(id)
        });
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].file.id, idle.id);
        assert!(uploads.get(busy.id).is_some());
    }
}
