//! Convertr Core Library
//!
//! This crate provides the domain models shared by the conversion server and the
//! batch client: the format capability table, the per-file conversion job state
//! machine, the batch session, wire payloads, error types and configuration.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{megabytes, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    lookup_targets, BatchSession, ConversionJob, ConversionOptions, DownloadHandle,
    FormatCategory, FormatTag, JobStatus, StatusMessage, TransitionError, UploadedFile,
};
