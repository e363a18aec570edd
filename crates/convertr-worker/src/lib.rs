//! Server-side conversion execution
//!
//! Upload and job registries, the bounded conversion queue with its
//! worker pool, and the reaper that expires finished work.

pub mod context;
pub mod queue;
pub mod reaper;
pub mod registry;

pub use context::{ConversionOutput, WorkerContext};
pub use queue::ConversionQueue;
pub use reaper::{reap_once, ReapStats, Reaper};
pub use registry::{JobRegistry, JobUpdate, StoredUpload, TrackedJob, UploadRegistry};
