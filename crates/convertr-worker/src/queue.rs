use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use convertr_core::AppError;

use crate::context::WorkerContext;

/// Bounded queue of job ids drained by a semaphore-gated worker pool
#[derive(Clone)]
pub struct ConversionQueue {
    tx: mpsc::Sender<Uuid>,
}

impl ConversionQueue {
    /// Create the queue and spawn its worker pool.
    ///
    /// At most `max_concurrent` conversions run at once. When `queue_size`
    /// jobs are already waiting, [`ConversionQueue::submit`] rejects new ones
    /// with [`AppError::QueueFull`].
    pub fn new(context: WorkerContext, max_concurrent: usize, queue_size: usize) -> Self {
        let queue_size = queue_size.max(1);
        let max_concurrent = max_concurrent.max(1);
        let (tx, rx) = mpsc::channel(queue_size);

        tokio::spawn(async move {
            Self::worker_pool(rx, context, max_concurrent).await;
        });

        tracing::info!(
            queue_size = queue_size,
            max_concurrent = max_concurrent,
            "Conversion queue initialized with bounded channel"
        );

        Self { tx }
    }

    #[tracing::instrument(skip(self))]
    pub fn submit(&self, job_id: Uuid) -> Result<(), AppError> {
        tracing::debug!(job_id = %job_id, "Enqueuing conversion job");
        self.tx.try_send(job_id).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!(job_id = %job_id, "Conversion queue is full, rejecting job");
                AppError::QueueFull
            }
            TrySendError::Closed(_) => AppError::Internal("Conversion queue is closed".to_string()),
        })
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<Uuid>,
        context: WorkerContext,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        while let Some(job_id) = rx.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let context = context.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::process_job(job_id, context).await;
            });
        }

        tracing::info!("Conversion queue closed, worker pool exiting");
    }

    /// Run one job in its own task so a panicking converter fails only that job
    async fn process_job(job_id: Uuid, context: WorkerContext) {
        let runner = context.clone();
        let outcome = tokio::spawn(async move { runner.execute(job_id).await }).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(job_id = %job_id, error = %e, "Job finished with an error");
            }
            Err(join_error) => {
                let detail = if join_error.is_panic() {
                    "Converter crashed unexpectedly"
                } else {
                    "Conversion was cancelled"
                };
                tracing::error!(job_id = %job_id, error = %join_error, "Conversion task aborted");
                if let Err(e) = context.jobs.fail(job_id, detail) {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job failure");
                }
            }
        }
    }
}
