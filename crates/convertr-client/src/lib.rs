//! Convertr Client Library
//!
//! Drives a batch of file conversions from the user's side: intake of local
//! files, per-file target selection, concurrent conversion through a
//! pluggable status source, and staggered bulk download of the results.

pub mod api;
pub mod blob;
pub mod config;
pub mod download;
pub mod error;
pub mod notice;
pub mod orchestrator;
pub mod status;

pub use api::ApiClient;
pub use blob::{Blob, BlobStore};
pub use config::{ClientConfig, StatusMode};
pub use download::{DirectoryDownloader, Downloader};
pub use error::{ApiError, OrchestratorError, NO_TARGET_MESSAGE};
pub use notice::{Notice, NoticeLevel};
pub use orchestrator::{BatchOrchestrator, CRASH_MESSAGE, DISCONNECTED_MESSAGE};
pub use status::{
    EventSink, JobEvent, JobTicket, PassthroughConverter, RemoteStatusSource,
    SimulatedStatusSource, StatusSource, StatusUpdate,
};
