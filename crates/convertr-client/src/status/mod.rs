//! Status sources
//!
//! A [`StatusSource`] drives one conversion attempt for one job and reports
//! what happens as [`JobEvent`]s. The orchestrator does not know which
//! implementation it talks to: the remote source and the simulated source
//! produce the same sequence of updates.

mod remote;
mod simulated;

pub use remote::RemoteStatusSource;
pub use simulated::{PassthroughConverter, SimulatedStatusSource};

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ConversionOptions, DownloadHandle, FormatTag, UploadedFile};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Progress(u8),
    Completed(DownloadHandle),
    Failed(String),
    /// The channel to the job was lost; its real state is unknown
    Disconnected(String),
}

impl StatusUpdate {
    /// No further updates follow for this attempt
    pub fn ends_attempt(&self) -> bool {
        !matches!(self, StatusUpdate::Progress(_))
    }
}

/// One update, tagged with the job and attempt it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub attempt: u32,
    pub update: StatusUpdate,
}

pub type EventSink = mpsc::UnboundedSender<JobEvent>;

/// Everything a status source needs to run one attempt
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub job_id: Uuid,
    pub attempt: u32,
    pub file: UploadedFile,
    pub data: Bytes,
    pub target: FormatTag,
    pub options: ConversionOptions,
}

impl JobTicket {
    /// Send an update for this attempt. Returns false once nobody is listening.
    pub fn emit(&self, sink: &EventSink, update: StatusUpdate) -> bool {
        sink.send(JobEvent {
            job_id: self.job_id,
            attempt: self.attempt,
            update,
        })
        .is_ok()
    }

    pub fn output_name(&self) -> String {
        self.file.output_name(&self.target)
    }
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Drive the attempt until it completes, fails or loses its channel,
    /// sending every update into `sink`. The last update sent is always one
    /// for which [`StatusUpdate::ends_attempt`] holds, unless the sink closes.
    async fn run(&self, ticket: JobTicket, sink: EventSink);

    /// The job was removed from the batch. Forget anything kept for a later
    /// attempt.
    fn abandon(&self, _job_id: Uuid) {}
}
