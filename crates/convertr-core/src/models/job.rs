//! Per-file conversion job state machine
//!
//! ```text
//! Ready --start--> Converting --succeed--> Completed
//!   ^                  |
//!   |                  +--fail--> Failed --retry--+
//!   +---------------------------------------------+
//! ```
//!
//! Every transition is a method returning `Result`. A rejected transition
//! leaves the job untouched, so callers can apply late or duplicate status
//! events without corrupting state.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use super::format::FormatTag;
use super::options::ConversionOptions;
use super::upload::UploadedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Ready,
    Converting,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Converting => write!(f, "converting"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(JobStatus::Ready),
            "converting" => Ok(JobStatus::Converting),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Where the converted output can be fetched from.
///
/// `location` is either an HTTP(S) URL (absolute or relative to the server)
/// or a `blob:` reference into the client's in-memory blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadHandle {
    pub location: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("No target format selected")]
    MissingTarget,

    #[error("{target_format} is not a supported target for {source_format} files")]
    UnsupportedTarget {
        source_format: FormatTag,
        target_format: FormatTag,
    },

    #[error("{kind} options do not apply to {category} files")]
    OptionsMismatch {
        kind: &'static str,
        category: String,
    },

    #[error("Cannot {action} a job that is {status}")]
    InvalidState {
        action: &'static str,
        status: JobStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionJob {
    id: Uuid,
    file: UploadedFile,
    target_format: Option<FormatTag>,
    status: JobStatus,
    progress: u8,
    download_handle: Option<DownloadHandle>,
    error_detail: Option<String>,
    options: ConversionOptions,
    attempt: u32,
}

impl ConversionJob {
    /// A ready job sharing the file's id
    pub fn new(file: UploadedFile) -> Self {
        Self::with_id(file.id, file)
    }

    pub fn with_id(id: Uuid, file: UploadedFile) -> Self {
        Self {
            id,
            options: ConversionOptions::for_category(file.category),
            file,
            target_format: None,
            status: JobStatus::Ready,
            progress: 0,
            download_handle: None,
            error_detail: None,
            attempt: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn file(&self) -> &UploadedFile {
        &self.file
    }

    pub fn target_format(&self) -> Option<&FormatTag> {
        self.target_format.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn download_handle(&self) -> Option<&DownloadHandle> {
        self.download_handle.as_ref()
    }

    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Incremented on every `start`; status events carry it so that events
    /// from an earlier attempt can be recognised and dropped.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Choose (or change) the output format. Idempotent.
    pub fn select_target(&mut self, target: FormatTag) -> Result<(), TransitionError> {
        self.ensure_not_converting("change the target of")?;
        if !self.file.supports_target(&target) {
            return Err(TransitionError::UnsupportedTarget {
                source_format: self.file.source_format.clone(),
                target_format: target,
            });
        }
        self.target_format = Some(target);
        Ok(())
    }

    pub fn clear_target(&mut self) -> Result<(), TransitionError> {
        self.ensure_not_converting("clear the target of")?;
        self.target_format = None;
        Ok(())
    }

    pub fn set_options(&mut self, options: ConversionOptions) -> Result<(), TransitionError> {
        self.ensure_not_converting("change the options of")?;
        if !options.applies_to(self.file.category) {
            return Err(TransitionError::OptionsMismatch {
                kind: options.kind(),
                category: self.file.category.to_string(),
            });
        }
        self.options = options;
        Ok(())
    }

    /// Ready -> Converting. Requires a selected target.
    pub fn start(&mut self) -> Result<u32, TransitionError> {
        if self.status != JobStatus::Ready {
            return Err(self.invalid("start"));
        }
        if self.target_format.is_none() {
            return Err(TransitionError::MissingTarget);
        }
        self.status = JobStatus::Converting;
        self.progress = 0;
        self.download_handle = None;
        self.error_detail = None;
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Begin a fresh attempt for a job that is already converting, keeping
    /// its progress. Used when the status channel for the previous attempt
    /// was lost.
    pub fn restart_attempt(&mut self) -> Result<u32, TransitionError> {
        if self.status != JobStatus::Converting {
            return Err(self.invalid("resume"));
        }
        self.attempt += 1;
        Ok(self.attempt)
    }

    /// Record progress. Values above 100 are clamped and regressions are
    /// ignored. Returns whether the stored progress changed.
    pub fn advance(&mut self, percent: u8) -> Result<bool, TransitionError> {
        if self.status != JobStatus::Converting {
            return Err(self.invalid("report progress for"));
        }
        let next = percent.min(100).max(self.progress);
        let changed = next != self.progress;
        self.progress = next;
        Ok(changed)
    }

    /// Converting -> Completed
    pub fn succeed(&mut self, handle: DownloadHandle) -> Result<(), TransitionError> {
        if self.status != JobStatus::Converting {
            return Err(self.invalid("complete"));
        }
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.download_handle = Some(handle);
        self.error_detail = None;
        Ok(())
    }

    /// Converting -> Failed
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != JobStatus::Converting {
            return Err(self.invalid("fail"));
        }
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.download_handle = None;
        self.error_detail = Some(detail.into());
        Ok(())
    }

    /// Failed -> Ready, keeping the selected target
    pub fn retry(&mut self) -> Result<(), TransitionError> {
        if self.status != JobStatus::Failed {
            return Err(self.invalid("retry"));
        }
        self.status = JobStatus::Ready;
        self.progress = 0;
        self.error_detail = None;
        Ok(())
    }

    /// Checks the status/progress/handle consistency rules
    pub fn is_consistent(&self) -> bool {
        let handle_ok = (self.status == JobStatus::Completed) == self.download_handle.is_some();
        let progress_ok = match self.status {
            JobStatus::Completed => self.progress == 100,
            JobStatus::Failed | JobStatus::Ready => self.progress == 0,
            JobStatus::Converting => self.progress <= 100,
        };
        let target_ok = self.status == JobStatus::Ready || self.target_format.is_some();
        handle_ok && progress_ok && target_ok
    }

    fn ensure_not_converting(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.status == JobStatus::Converting {
            return Err(self.invalid(action));
        }
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> TransitionError {
        TransitionError::InvalidState {
            action,
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::options::{AudioOptions, ImageOptions};

    fn png_job() -> ConversionJob {
        ConversionJob::new(UploadedFile::new("a.png", FormatTag::new("png"), 100))
    }

    fn handle() -> DownloadHandle {
        DownloadHandle {
            location: "/api/download/abc".to_string(),
            file_name: "a.jpg".to_string(),
        }
    }

    #[test]
    fn test_new_job_is_ready() {
        let job = png_job();
        assert_eq!(job.status(), JobStatus::Ready);
        assert_eq!(job.progress(), 0);
        assert_eq!(job.id(), job.file().id);
        assert!(job.target_format().is_none());
        assert!(job.is_consistent());
    }

    #[test]
    fn test_start_requires_target() {
        let mut job = png_job();
        assert_eq!(job.start(), Err(TransitionError::MissingTarget));
        assert_eq!(job.status(), JobStatus::Ready);
        assert_eq!(job.attempt(), 0);
    }

    #[test]
    fn test_select_target_rejects_unsupported() {
        let mut job = png_job();
        let err = job.select_target(FormatTag::new("mp3")).unwrap_err();
        assert!(matches!(err, TransitionError::UnsupportedTarget { .. }));
        assert!(job.target_format().is_none());
    }

    #[test]
    fn test_select_target_is_idempotent() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        let before = job.clone();
        job.select_target(FormatTag::new("jpg")).unwrap();
        assert_eq!(job, before);
    }

    #[test]
    fn test_target_locked_while_converting() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        job.start().unwrap();
        assert!(job.select_target(FormatTag::new("webp")).is_err());
        assert!(job.clear_target().is_err());
        assert_eq!(job.target_format(), Some(&FormatTag::new("jpg")));
    }

    #[test]
    fn test_happy_path() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        assert_eq!(job.start(), Ok(1));
        assert_eq!(job.status(), JobStatus::Converting);
        assert!(job.advance(40).unwrap());
        job.succeed(handle()).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 100);
        assert_eq!(job.download_handle(), Some(&handle()));
        assert!(job.is_consistent());
    }

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        job.start().unwrap();

        let mut seen = Vec::new();
        for p in [10, 30, 20, 80] {
            job.advance(p).unwrap();
            seen.push(job.progress());
        }
        assert_eq!(seen, vec![10, 30, 30, 80]);

        assert!(job.advance(250).unwrap());
        assert_eq!(job.progress(), 100);
        assert!(!job.advance(99).unwrap());
    }

    #[test]
    fn test_progress_rejected_outside_converting() {
        let mut job = png_job();
        assert!(job.advance(50).is_err());
        assert_eq!(job.progress(), 0);
    }

    #[test]
    fn test_fail_resets_progress_and_handle() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        job.start().unwrap();
        job.advance(70).unwrap();
        job.fail("decoder exploded").unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.progress(), 0);
        assert!(job.download_handle().is_none());
        assert_eq!(job.error_detail(), Some("decoder exploded"));
        assert!(job.is_consistent());
    }

    #[test]
    fn test_terminal_states_ignore_late_events() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        job.start().unwrap();
        job.succeed(handle()).unwrap();
        let completed = job.clone();

        assert!(job.fail("late").is_err());
        assert!(job.advance(10).is_err());
        assert!(job.succeed(handle()).is_err());
        assert_eq!(job, completed);
    }

    #[test]
    fn test_retry_keeps_target_and_bumps_attempt_on_restart() {
        let mut job = png_job();
        job.select_target(FormatTag::new("webp")).unwrap();
        job.start().unwrap();
        job.fail("boom").unwrap();
        job.retry().unwrap();
        assert_eq!(job.status(), JobStatus::Ready);
        assert_eq!(job.target_format(), Some(&FormatTag::new("webp")));
        assert!(job.error_detail().is_none());
        assert_eq!(job.start(), Ok(2));
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut job = png_job();
        assert!(job.retry().is_err());
    }

    #[test]
    fn test_restart_attempt_keeps_progress() {
        let mut job = png_job();
        job.select_target(FormatTag::new("jpg")).unwrap();
        job.start().unwrap();
        job.advance(60).unwrap();
        assert_eq!(job.restart_attempt(), Ok(2));
        assert_eq!(job.progress(), 60);
        assert_eq!(job.status(), JobStatus::Converting);
    }

    #[test]
    fn test_set_options_checks_category() {
        let mut job = png_job();
        let err = job
            .set_options(ConversionOptions::Audio(AudioOptions::default()))
            .unwrap_err();
        assert!(matches!(err, TransitionError::OptionsMismatch { .. }));

        let options = ConversionOptions::Image(ImageOptions {
            quality: 70,
            max_width: Some(640),
            max_height: None,
        });
        job.set_options(options.clone()).unwrap();
        assert_eq!(job.options(), &options);
    }

    #[test]
    fn test_job_status_display_round_trips() {
        for status in [
            JobStatus::Ready,
            JobStatus::Converting,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }
}
