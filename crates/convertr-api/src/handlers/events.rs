//! Server-sent status events for one job
//!
//! The stream opens with the job's current state, then forwards every
//! update for that job and ends after the first terminal message.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use convertr_core::models::StatusMessage;
use convertr_core::AppError;
use convertr_worker::{JobRegistry, JobUpdate};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use uuid::Uuid;

struct EventCursor {
    job_id: Uuid,
    jobs: JobRegistry,
    updates: Receiver<JobUpdate>,
    pending: Option<StatusMessage>,
    finished: bool,
}

impl EventCursor {
    async fn next_message(&mut self) -> Option<StatusMessage> {
        if let Some(message) = self.pending.take() {
            return Some(message);
        }
        loop {
            match self.updates.recv().await {
                Ok(update) if update.job_id == self.job_id => return Some(update.message),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(job_id = %self.job_id, skipped, "Event subscriber lagged, resyncing");
                    return self.jobs.get(self.job_id).map(|tracked| tracked.status_message());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

fn to_event(message: &StatusMessage) -> Result<Event, axum::Error> {
    Event::default().json_data(message)
}

#[tracing::instrument(skip(state))]
pub async fn job_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, HttpAppError> {
    // Subscribe before the snapshot so no update falls between the two
    let updates = state.worker.jobs.subscribe();
    let current = state
        .worker
        .jobs
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?
        .status_message();

    let cursor = EventCursor {
        job_id: id,
        jobs: state.worker.jobs.clone(),
        updates,
        pending: Some(current),
        finished: false,
    };

    let stream = stream::unfold(cursor, |mut cursor| async move {
        if cursor.finished {
            return None;
        }
        let message = cursor.next_message().await?;
        cursor.finished = message.is_terminal();
        Some((to_event(&message), cursor))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
