//! Batch session: the ordered set of jobs owned by one client session
//!
//! The session is the single owner of its jobs. Mutation goes through
//! [`BatchSession::update`], which keeps the completed-id set in step with
//! job status after every change.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::job::{ConversionJob, JobStatus};

/// Which surface the session presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// No files yet; waiting for uploads
    Upload,
    /// At least one job exists
    Conversion,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub ready: usize,
    pub converting: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredSession")]
pub struct BatchSession {
    jobs: Vec<ConversionJob>,
    completed_ids: HashSet<Uuid>,
}

/// Wire form read back into a session. Any stored completed set is ignored
/// and rebuilt from job statuses.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    jobs: Vec<ConversionJob>,
}

impl TryFrom<StoredSession> for BatchSession {
    type Error = String;

    fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
        let mut session = BatchSession::new();
        for job in stored.jobs {
            let id = job.id();
            if !job.is_consistent() {
                return Err(format!("job {} has an inconsistent state", id));
            }
            if !session.push(job) {
                return Err(format!("duplicate job id {}", id));
            }
        }
        Ok(session)
    }
}

impl BatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn mode(&self) -> SessionMode {
        if self.jobs.is_empty() {
            SessionMode::Upload
        } else {
            SessionMode::Conversion
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversionJob> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Append a job. Returns false if a job with the same id already exists.
    pub fn push(&mut self, job: ConversionJob) -> bool {
        if self.contains(job.id()) {
            return false;
        }
        self.sync_completed(&job);
        self.jobs.push(job);
        true
    }

    pub fn remove(&mut self, id: Uuid) -> Option<ConversionJob> {
        let index = self.jobs.iter().position(|job| job.id() == id)?;
        self.completed_ids.remove(&id);
        Some(self.jobs.remove(index))
    }

    /// Apply `f` to one job and resynchronise the completed set.
    /// Returns `None` if no job has that id.
    pub fn update<F, R>(&mut self, id: Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut ConversionJob) -> R,
    {
        let job = self.jobs.iter_mut().find(|job| job.id() == id)?;
        let result = f(job);
        if job.status() == JobStatus::Completed {
            self.completed_ids.insert(id);
        } else {
            self.completed_ids.remove(&id);
        }
        Some(result)
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.completed_ids.clear();
    }

    pub fn completed_count(&self) -> usize {
        self.completed_ids.len()
    }

    pub fn is_completed(&self, id: Uuid) -> bool {
        self.completed_ids.contains(&id)
    }

    pub fn completed_ids(&self) -> &HashSet<Uuid> {
        &self.completed_ids
    }

    /// Completed jobs in session order
    pub fn completed_jobs(&self) -> impl Iterator<Item = &ConversionJob> {
        self.jobs
            .iter()
            .filter(|job| self.completed_ids.contains(&job.id()))
    }

    pub fn counts(&self) -> StatusCounts {
        self.jobs
            .iter()
            .fold(StatusCounts::default(), |mut counts, job| {
                match job.status() {
                    JobStatus::Ready => counts.ready += 1,
                    JobStatus::Converting => counts.converting += 1,
                    JobStatus::Completed => counts.completed += 1,
                    JobStatus::Failed => counts.failed += 1,
                }
                counts
            })
    }

    /// The completed set matches job statuses exactly and every job is
    /// internally consistent
    pub fn is_consistent(&self) -> bool {
        let derived: HashSet<Uuid> = self
            .jobs
            .iter()
            .filter(|job| job.status() == JobStatus::Completed)
            .map(|job| job.id())
            .collect();
        derived == self.completed_ids && self.jobs.iter().all(ConversionJob::is_consistent)
    }

    fn sync_completed(&mut self, job: &ConversionJob) {
        if job.status() == JobStatus::Completed {
            self.completed_ids.insert(job.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::FormatTag;
    use crate::models::job::DownloadHandle;
    use crate::models::upload::UploadedFile;

    fn job(name: &str, ext: &str) -> ConversionJob {
        ConversionJob::new(UploadedFile::new(name, FormatTag::new(ext), 10))
    }

    fn complete(session: &mut BatchSession, id: Uuid) {
        session
            .update(id, |job| {
                let target = job.file().supported_target_formats[0].clone();
                job.select_target(target)?;
                job.start()?;
                job.succeed(DownloadHandle {
                    location: format!("blob:{id}"),
                    file_name: "out".to_string(),
                })
            })
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_mode_follows_job_count() {
        let mut session = BatchSession::new();
        assert_eq!(session.mode(), SessionMode::Upload);
        let j = job("a.png", "png");
        let id = j.id();
        session.push(j);
        assert_eq!(session.mode(), SessionMode::Conversion);
        session.remove(id);
        assert_eq!(session.mode(), SessionMode::Upload);
    }

    #[test]
    fn test_push_rejects_duplicate_ids() {
        let mut session = BatchSession::new();
        let j = job("a.png", "png");
        assert!(session.push(j.clone()));
        assert!(!session.push(j));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_update_tracks_completed_ids() {
        let mut session = BatchSession::new();
        let a = job("a.png", "png");
        let b = job("b.wav", "wav");
        let (a_id, b_id) = (a.id(), b.id());
        session.push(a);
        session.push(b);

        complete(&mut session, b_id);
        assert_eq!(session.completed_count(), 1);
        assert!(session.is_completed(b_id));
        assert!(!session.is_completed(a_id));
        assert!(session.is_consistent());
    }

    #[test]
    fn test_completed_jobs_follow_session_order() {
        let mut session = BatchSession::new();
        let ids: Vec<Uuid> = (0..4)
            .map(|i| {
                let j = job(&format!("{i}.png"), "png");
                let id = j.id();
                session.push(j);
                id
            })
            .collect();
        complete(&mut session, ids[3]);
        complete(&mut session, ids[1]);

        let order: Vec<Uuid> = session.completed_jobs().map(|j| j.id()).collect();
        assert_eq!(order, vec![ids[1], ids[3]]);
    }

    #[test]
    fn test_remove_drops_completed_id() {
        let mut session = BatchSession::new();
        let a = job("a.png", "png");
        let id = a.id();
        session.push(a);
        complete(&mut session, id);
        assert!(session.remove(id).is_some());
        assert_eq!(session.completed_count(), 0);
        assert!(session.is_consistent());
    }

    #[test]
    fn test_deserialize_rebuilds_completed_ids() {
        let mut session = BatchSession::new();
        let a = job("a.png", "png");
        let b = job("b.png", "png");
        let (a_id, b_id) = (a.id(), b.id());
        session.push(a);
        session.push(b);
        complete(&mut session, b_id);

        let mut json = serde_json::to_value(&session).unwrap();
        json["completedIds"] = serde_json::json!([a_id, Uuid::new_v4()]);

        let restored: BatchSession = serde_json::from_value(json).unwrap();
        assert!(restored.is_consistent());
        assert_eq!(restored.completed_count(), 1);
        assert!(restored.is_completed(b_id));
        assert!(!restored.is_completed(a_id));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_jobs() {
        let a = job("a.png", "png");
        let json = serde_json::json!({ "jobs": [a.clone(), a] });
        let err = serde_json::from_value::<BatchSession>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate job id"));

        // Completed without a download handle
        let mut json = serde_json::json!({ "jobs": [job("c.png", "png")] });
        json["jobs"][0]["status"] = serde_json::json!("completed");
        json["jobs"][0]["progress"] = serde_json::json!(100);
        let err = serde_json::from_value::<BatchSession>(json).unwrap_err();
        assert!(err.to_string().contains("inconsistent state"));
    }

    #[test]
    fn test_update_unknown_id_returns_none() {
        let mut session = BatchSession::new();
        assert!(session.update(Uuid::new_v4(), |_| ()).is_none());
    }

    #[test]
    fn test_counts() {
        let mut session = BatchSession::new();
        let a = job("a.png", "png");
        let b = job("b.png", "png");
        let c = job("c.png", "png");
        let (a_id, b_id) = (a.id(), b.id());
        session.push(a);
        session.push(b);
        session.push(c);
        complete(&mut session, a_id);
        session
            .update(b_id, |job| {
                job.select_target(FormatTag::new("jpg")).unwrap();
                job.start().unwrap();
            })
            .unwrap();
        assert_eq!(
            session.counts(),
            StatusCounts {
                ready: 1,
                converting: 1,
                completed: 1,
                failed: 0,
            }
        );
    }
}
