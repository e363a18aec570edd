//! Data models
//!
//! Each sub-module covers one concern of the conversion domain.

mod api;
pub mod format;
mod info;
mod job;
pub mod options;
mod session;
mod status;
mod upload;

pub use api::*;
pub use format::{is_conversion_supported, lookup_targets, FormatCategory, FormatTag};
pub use info::FileInfo;
pub use job::{ConversionJob, DownloadHandle, JobStatus, TransitionError};
pub use options::{
    ArchiveOptions, AudioOptions, ConversionOptions, DocumentOptions, ImageOptions, VideoOptions,
};
pub use session::{BatchSession, SessionMode, StatusCounts};
pub use status::StatusMessage;
pub use upload::UploadedFile;
