//! Batch orchestrator
//!
//! [`BatchOrchestrator`] is the single owner of a [`BatchSession`]. Every
//! mutation goes through `&mut self`; status sources run on spawned tasks
//! and only send [`JobEvent`]s back, which the owner applies one at a time
//! through [`BatchOrchestrator::apply`]. A job never sees a half-applied
//! update, and events for removed jobs or superseded attempts are dropped.

use bytes::Bytes;
use convertr_core::models::{
    BatchSession, ConversionJob, ConversionOptions, DownloadHandle, FormatTag, JobStatus,
};
use convertr_processing::{IntakeReport, IntakeValidator, RawFile};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::blob::BlobStore;
use crate::config::{ClientConfig, StatusMode};
use crate::download::{DirectoryDownloader, Downloader};
use crate::error::{OrchestratorError, NO_TARGET_MESSAGE};
use crate::notice::Notice;
use crate::status::{
    JobEvent, JobTicket, RemoteStatusSource, SimulatedStatusSource, StatusSource, StatusUpdate,
};

/// Recorded on a job whose conversion task panicked
pub const CRASH_MESSAGE: &str = "Converter crashed unexpectedly";

/// Posted when a job's status channel is lost
pub const DISCONNECTED_MESSAGE: &str =
    "Lost connection to the conversion server. Convert again to resume.";

const DEFAULT_STAGGER: Duration = Duration::from_millis(500);

pub struct BatchOrchestrator {
    session: BatchSession,
    validator: IntakeValidator,
    source: Arc<dyn StatusSource>,
    downloader: Arc<dyn Downloader>,
    blobs: Option<BlobStore>,
    data: HashMap<Uuid, Bytes>,
    /// Converting jobs whose status channel was lost
    detached: HashSet<Uuid>,
    events_tx: mpsc::UnboundedSender<JobEvent>,
    events_rx: mpsc::UnboundedReceiver<JobEvent>,
    notices: Vec<Notice>,
    stagger: Duration,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn StatusSource>,
        downloader: Arc<dyn Downloader>,
        validator: IntakeValidator,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: BatchSession::new(),
            validator,
            source,
            downloader,
            blobs: None,
            data: HashMap::new(),
            detached: HashSet::new(),
            events_tx,
            events_rx,
            notices: Vec::new(),
            stagger: DEFAULT_STAGGER,
        }
    }

    /// Pause between successive downloads in [`download_all`](Self::download_all)
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Blob store holding locally produced outputs, released on removal and reset
    pub fn with_blob_store(mut self, blobs: BlobStore) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Wire up the status source and downloader selected by `config`.
    /// Outputs are saved under `download_dir`.
    pub fn from_config(
        config: &ClientConfig,
        download_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let blobs = BlobStore::new();
        let validator = IntakeValidator::new(config.max_file_size_bytes, false);
        let downloader = DirectoryDownloader::new(download_dir, blobs.clone());

        let (source, downloader): (Arc<dyn StatusSource>, DirectoryDownloader) = match config.mode
        {
            StatusMode::Remote => {
                let api = ApiClient::new(&config.api_url, config.request_timeout)?;
                (
                    Arc::new(RemoteStatusSource::new(api.clone(), config.poll_interval)),
                    downloader.with_api(api),
                )
            }
            StatusMode::Simulated => (
                Arc::new(SimulatedStatusSource::new(
                    blobs.clone(),
                    config.simulated_step,
                    config.simulated_interval,
                )),
                downloader,
            ),
        };

        tracing::info!(source = source.name(), "Batch orchestrator ready");

        Ok(Self::new(source, Arc::new(downloader), validator)
            .with_stagger(config.download_stagger)
            .with_blob_store(blobs))
    }

    pub fn session(&self) -> &BatchSession {
        &self.session
    }

    pub fn job(&self, id: Uuid) -> Option<&ConversionJob> {
        self.session.get(id)
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Validate `files` and append a ready job for each accepted one, in
    /// input order. Each rejected file becomes an error notice.
    pub fn add_files(&mut self, files: Vec<RawFile>) -> IntakeReport {
        let report = self.validator.ingest(files);

        for accepted in &report.accepted {
            let job = ConversionJob::new(accepted.file.clone());
            let id = job.id();
            if self.session.push(job) {
                self.data.insert(id, accepted.data.clone());
            }
        }
        for rejected in &report.rejected {
            self.notices.push(Notice::error(
                None,
                format!("{}: {}", rejected.original_name, rejected.error),
            ));
        }

        tracing::debug!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "Files added"
        );
        report
    }

    /// Drop a job. A running attempt is abandoned and its events ignored.
    pub fn remove_file(&mut self, id: Uuid) -> bool {
        let Some(job) = self.session.remove(id) else {
            return false;
        };
        self.data.remove(&id);
        self.detached.remove(&id);
        self.source.abandon(id);
        self.release_output(&job);
        tracing::debug!(job_id = %id, "File removed");
        true
    }

    /// Unknown ids are ignored
    pub fn set_target(&mut self, id: Uuid, target: FormatTag) -> Result<(), OrchestratorError> {
        match self.session.update(id, |job| job.select_target(target)) {
            Some(result) => Ok(result?),
            None => Ok(()),
        }
    }

    pub fn clear_target(&mut self, id: Uuid) -> Result<(), OrchestratorError> {
        self.session
            .update(id, ConversionJob::clear_target)
            .ok_or(OrchestratorError::UnknownJob(id))??;
        Ok(())
    }

    pub fn set_options(
        &mut self,
        id: Uuid,
        options: ConversionOptions,
    ) -> Result<(), OrchestratorError> {
        self.session
            .update(id, |job| job.set_options(options))
            .ok_or(OrchestratorError::UnknownJob(id))??;
        Ok(())
    }

    /// Failed back to ready, keeping the selected target
    pub fn retry(&mut self, id: Uuid) -> Result<(), OrchestratorError> {
        self.session
            .update(id, ConversionJob::retry)
            .ok_or(OrchestratorError::UnknownJob(id))??;
        Ok(())
    }

    /// Start every ready job that has a target, and relaunch converting jobs
    /// whose status channel was lost. Returns how many attempts were launched.
    ///
    /// Fails with [`OrchestratorError::NoTargetSelected`] when nothing could
    /// be launched because no ready job has a target.
    pub fn convert_all(&mut self) -> Result<usize, OrchestratorError> {
        let mut to_start = Vec::new();
        let mut to_resume = Vec::new();
        let mut missing_target = false;

        for job in self.session.jobs() {
            match job.status() {
                JobStatus::Ready if job.target_format().is_none() => missing_target = true,
                JobStatus::Ready => to_start.push(job.id()),
                JobStatus::Converting if self.detached.contains(&job.id()) => {
                    to_resume.push(job.id())
                }
                _ => {}
            }
        }

        if to_start.is_empty() && to_resume.is_empty() {
            if missing_target {
                self.notices.push(Notice::warning(None, NO_TARGET_MESSAGE));
                return Err(OrchestratorError::NoTargetSelected);
            }
            return Ok(0);
        }

        let mut launched = 0;
        for id in to_start {
            let attempt = self
                .session
                .update(id, ConversionJob::start)
                .ok_or(OrchestratorError::UnknownJob(id))??;
            launched += usize::from(self.launch(id, attempt));
        }
        for id in to_resume {
            self.detached.remove(&id);
            let attempt = self
                .session
                .update(id, ConversionJob::restart_attempt)
                .ok_or(OrchestratorError::UnknownJob(id))??;
            tracing::info!(job_id = %id, attempt, "Resuming conversion");
            launched += usize::from(self.launch(id, attempt));
        }

        tracing::info!(launched, source = self.source.name(), "Conversions launched");
        Ok(launched)
    }

    fn launch(&self, id: Uuid, attempt: u32) -> bool {
        let Some(job) = self.session.get(id) else {
            return false;
        };
        let Some(target) = job.target_format().cloned() else {
            return false;
        };

        let ticket = JobTicket {
            job_id: id,
            attempt,
            file: job.file().clone(),
            data: self.data.get(&id).cloned().unwrap_or_default(),
            target,
            options: job.options().clone(),
        };

        let source = Arc::clone(&self.source);
        let sink = self.events_tx.clone();
        tokio::spawn(async move {
            let guard = ticket.clone();
            let task_sink = sink.clone();
            let outcome = tokio::spawn(async move { source.run(ticket, task_sink).await }).await;

            if let Err(e) = outcome {
                if e.is_panic() {
                    tracing::error!(job_id = %guard.job_id, attempt = guard.attempt, "Conversion task panicked");
                    guard.emit(&sink, StatusUpdate::Failed(CRASH_MESSAGE.to_string()));
                }
            }
        });
        true
    }

    /// Apply one status event. Returns whether it changed the session.
    pub fn apply(&mut self, event: JobEvent) -> bool {
        let JobEvent {
            job_id,
            attempt,
            update,
        } = event;

        let Some(job) = self.session.get(job_id) else {
            tracing::debug!(job_id = %job_id, "Dropping event for unknown job");
            self.discard(update);
            return false;
        };
        let (status, current) = (job.status(), job.attempt());
        if current != attempt {
            tracing::debug!(
                job_id = %job_id,
                attempt,
                current,
                "Dropping event from a previous attempt"
            );
            self.discard(update);
            return false;
        }

        let applied = match update {
            StatusUpdate::Progress(percent) => {
                matches!(self.session.update(job_id, |j| j.advance(percent)), Some(Ok(true)))
            }
            StatusUpdate::Completed(handle) => {
                let done = matches!(
                    self.session.update(job_id, |j| j.succeed(handle.clone())),
                    Some(Ok(()))
                );
                if done {
                    tracing::info!(job_id = %job_id, "Conversion completed");
                } else {
                    self.discard(StatusUpdate::Completed(handle));
                }
                done
            }
            StatusUpdate::Failed(detail) => {
                tracing::warn!(job_id = %job_id, error = %detail, "Conversion failed");
                matches!(self.session.update(job_id, |j| j.fail(detail)), Some(Ok(())))
            }
            StatusUpdate::Disconnected(detail) => {
                if status != JobStatus::Converting {
                    return false;
                }
                tracing::warn!(job_id = %job_id, error = %detail, "Status channel lost");
                self.detached.insert(job_id);
                self.notices
                    .push(Notice::warning(Some(job_id), DISCONNECTED_MESSAGE));
                true
            }
        };

        debug_assert!(self.session.is_consistent());
        applied
    }

    /// Apply every event already queued, without waiting.
    /// Returns how many changed the session.
    pub fn pump(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            changed += usize::from(self.apply(event));
        }
        changed
    }

    /// Wait for the next event and apply it
    pub async fn step(&mut self) -> Option<bool> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    /// No attempt is running. Converting jobs whose channel was lost do not
    /// count as running.
    pub fn is_idle(&self) -> bool {
        self.session
            .jobs()
            .iter()
            .filter(|job| job.status() == JobStatus::Converting)
            .all(|job| self.detached.contains(&job.id()))
    }

    /// Apply events until every running attempt has ended
    pub async fn wait_idle(&mut self) {
        while !self.is_idle() {
            if self.step().await.is_none() {
                break;
            }
        }
    }

    /// Download every completed job in session order, pausing between
    /// downloads. A failed download becomes a notice and does not stop the
    /// rest. Returns how many were saved.
    pub async fn download_all(&mut self) -> usize {
        let handles: Vec<(Uuid, DownloadHandle)> = self
            .session
            .completed_jobs()
            .filter_map(|job| job.download_handle().map(|h| (job.id(), h.clone())))
            .collect();

        let mut saved = 0;
        for (index, (id, handle)) in handles.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.stagger).await;
            }
            match self.downloader.download(handle).await {
                Ok(_) => saved += 1,
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "Download failed");
                    self.notices.push(Notice::error(
                        Some(*id),
                        format!("Failed to download {}: {}", handle.file_name, e),
                    ));
                }
            }
        }

        tracing::info!(saved, total = handles.len(), "Bulk download finished");
        saved
    }

    pub async fn download(&self, id: Uuid) -> Result<PathBuf, OrchestratorError> {
        let job = self
            .session
            .get(id)
            .ok_or(OrchestratorError::UnknownJob(id))?;
        let handle = job
            .download_handle()
            .ok_or(OrchestratorError::NotCompleted(id))?;
        self.downloader
            .download(handle)
            .await
            .map_err(|e| OrchestratorError::Download(e.to_string()))
    }

    /// Back to an empty session. Running attempts are abandoned.
    pub fn reset(&mut self) {
        for job in self.session.jobs() {
            self.source.abandon(job.id());
        }
        self.session.clear();
        self.data.clear();
        self.detached.clear();
        self.notices.clear();
        if let Some(blobs) = &self.blobs {
            blobs.clear();
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.discard(event.update);
        }
        tracing::debug!("Session reset");
    }

    /// Free the output of a completion nobody will apply
    fn discard(&self, update: StatusUpdate) {
        let (Some(blobs), StatusUpdate::Completed(handle)) = (&self.blobs, update) else {
            return;
        };
        if blobs.remove(&handle.location).is_some() {
            tracing::debug!(location = %handle.location, "Released orphaned output");
        }
    }

    fn release_output(&self, job: &ConversionJob) {
        if let (Some(blobs), Some(handle)) = (&self.blobs, job.download_handle()) {
            blobs.remove(&handle.location);
        }
    }
}
