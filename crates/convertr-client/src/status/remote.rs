use async_trait::async_trait;
use convertr_core::models::{DownloadHandle, StatusMessage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{EventSink, JobTicket, StatusSource, StatusUpdate};
use crate::api::ApiClient;
use crate::error::ApiError;

/// Uploads the file, requests an asynchronous conversion and polls the
/// server's job endpoint until the job finishes.
///
/// A server job that was still running when the channel was lost is
/// remembered, so a relaunched attempt resumes polling it instead of
/// converting the file again.
pub struct RemoteStatusSource {
    api: ApiClient,
    poll_interval: Duration,
    server_jobs: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl RemoteStatusSource {
    pub fn new(api: ApiClient, poll_interval: Duration) -> Self {
        Self {
            api,
            poll_interval,
            server_jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn submit(&self, ticket: &JobTicket) -> Result<Uuid, ApiError> {
        let upload = self
            .api
            .upload(&ticket.file.original_name, ticket.data.clone())
            .await?;

        let Some(remote_file) = upload.files.into_iter().next() else {
            let reason = upload
                .errors
                .into_iter()
                .next()
                .map(|rejected| rejected.message)
                .unwrap_or_else(|| "The server did not accept the file".to_string());
            return Err(ApiError::Rejected(reason));
        };

        let accepted = self
            .api
            .convert(remote_file.id, &ticket.target, Some(&ticket.options))
            .await?;
        tracing::debug!(
            job_id = %ticket.job_id,
            server_job_id = %accepted.job_id,
            "Conversion submitted"
        );
        Ok(accepted.job_id)
    }

    async fn drive(&self, ticket: &JobTicket, sink: &EventSink) -> Result<(), ApiError> {
        let known = self.server_jobs.lock().get(&ticket.job_id).copied();
        let server_job = match known {
            Some(server_job) => server_job,
            None => {
                let server_job = self.submit(ticket).await?;
                self.server_jobs.lock().insert(ticket.job_id, server_job);
                server_job
            }
        };

        let mut last_progress = None;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let status = self.api.job_status(server_job).await?;

            let update = match status.to_message() {
                StatusMessage::Progress { progress } => {
                    if last_progress == Some(progress) {
                        continue;
                    }
                    last_progress = Some(progress);
                    StatusUpdate::Progress(progress)
                }
                StatusMessage::Completed {
                    download_url,
                    file_name,
                    ..
                } => StatusUpdate::Completed(DownloadHandle {
                    location: self.api.resolve(&download_url),
                    file_name: file_name.unwrap_or_else(|| ticket.output_name()),
                }),
                StatusMessage::Error { error } => StatusUpdate::Failed(error),
            };

            let finished = update.ends_attempt();
            if finished {
                self.server_jobs.lock().remove(&ticket.job_id);
            }
            if !ticket.emit(sink, update) || finished {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl StatusSource for RemoteStatusSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    #[tracing::instrument(skip(self, ticket, sink), fields(job_id = %ticket.job_id, attempt = ticket.attempt))]
    async fn run(&self, ticket: JobTicket, sink: EventSink) {
        if let Err(e) = self.drive(&ticket, &sink).await {
            let update = if e.is_retryable() {
                tracing::warn!(error = %e, "Lost contact with the conversion server");
                StatusUpdate::Disconnected(e.to_string())
            } else {
                tracing::debug!(error = %e, "Server refused the conversion");
                self.server_jobs.lock().remove(&ticket.job_id);
                StatusUpdate::Failed(e.to_string())
            };
            ticket.emit(&sink, update);
        }
    }

    fn abandon(&self, job_id: Uuid) {
        if let Some(server_job) = self.server_jobs.lock().remove(&job_id) {
            tracing::debug!(job_id = %job_id, server_job_id = %server_job, "Forgot server job");
        }
    }
}
