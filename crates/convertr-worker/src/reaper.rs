//! Periodic cleanup of finished jobs, stale uploads and expired cache entries

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::context::WorkerContext;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReapStats {
    pub jobs: usize,
    pub uploads: usize,
    pub cache_entries: usize,
}

fn cutoff(retention: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(retention)
        .ok()
        .and_then(|delta| Utc::now().checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Drop finished jobs and unreferenced uploads older than `retention`,
/// deleting their stored bytes
pub async fn reap_once(context: &WorkerContext, retention: Duration) -> ReapStats {
    let cutoff = cutoff(retention);

    let jobs = context.jobs.prune_finished(cutoff);
    for tracked in &jobs {
        if let Some(key) = &tracked.output_key {
            if let Err(e) = context.storage.delete(key).await {
                tracing::warn!(job_id = %tracked.job.id(), error = %e, "Failed to delete converted output");
            }
        }
    }

    let uploads = context
        .uploads
        .prune(cutoff, &|file_id| context.jobs.references_file(file_id));
    for upload in &uploads {
        if let Err(e) = context.storage.delete(&upload.storage_key).await {
            tracing::warn!(file_id = %upload.file.id, error = %e, "Failed to delete upload");
        }
    }

    let stats = ReapStats {
        jobs: jobs.len(),
        uploads: uploads.len(),
        cache_entries: context.manager.purge_cache(),
    };
    if stats != ReapStats::default() {
        tracing::info!(
            jobs = stats.jobs,
            uploads = stats.uploads,
            cache_entries = stats.cache_entries,
            "Reaped expired conversion state"
        );
    }
    stats
}

pub struct Reaper {
    shutdown_tx: mpsc::Sender<()>,
}

impl Reaper {
    pub fn spawn(context: WorkerContext, retention: Duration, every: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        reap_once(&context, retention).await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
            tracing::debug!("Reaper stopped");
        });

        tracing::info!(
            retention_secs = retention.as_secs(),
            interval_secs = every.as_secs(),
            "Job reaper started"
        );

        Self { shutdown_tx }
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}
