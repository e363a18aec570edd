//! Test doubles for status sources and downloaders.

#![allow(dead_code)]

use async_trait::async_trait;
use convertr_client::{
    BatchOrchestrator, Downloader, EventSink, JobTicket, StatusSource,
    StatusUpdate,
};
use convertr_core::models::DownloadHandle;
use convertr_processing::{IntakeValidator, RawFile};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

pub const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

/// Emits a fixed list of updates per file name. Files without a script get
/// no updates at all, so the test can feed events through `apply`.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<StatusUpdate>>,
    pub launched: Arc<Mutex<Vec<JobTicket>>>,
    pub abandoned: Arc<Mutex<Vec<Uuid>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, file_name: &str, updates: Vec<StatusUpdate>) -> Self {
        self.scripts.insert(file_name.to_string(), updates);
        self
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, ticket: JobTicket, sink: EventSink) {
        self.launched.lock().push(ticket.clone());
        let updates = self
            .scripts
            .get(&ticket.file.original_name)
            .cloned()
            .unwrap_or_default();
        for update in updates {
            if !ticket.emit(&sink, update) {
                return;
            }
        }
    }

    fn abandon(&self, job_id: Uuid) {
        self.abandoned.lock().push(job_id);
    }
}

/// Panics on every run
pub struct PanickingSource;

#[async_trait]
impl StatusSource for PanickingSource {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn run(&self, ticket: JobTicket, _sink: EventSink) {
        panic!("decoder blew up on {}", ticket.file.original_name);
    }
}

/// Records each call with the (tokio) time it happened
#[derive(Default)]
pub struct RecordingDownloader {
    pub calls: Arc<Mutex<Vec<(String, Instant)>>>,
    fail_on: Option<String>,
}

impl RecordingDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Downloader for RecordingDownloader {
    async fn download(&self, handle: &DownloadHandle) -> anyhow::Result<PathBuf> {
        self.calls
            .lock()
            .push((handle.file_name.clone(), Instant::now()));
        if self.fail_on.as_deref() == Some(handle.file_name.as_str()) {
            anyhow::bail!("disk full");
        }
        Ok(PathBuf::from(&handle.file_name))
    }
}

pub fn completed(file_name: &str) -> StatusUpdate {
    StatusUpdate::Completed(DownloadHandle {
        location: format!("memory://{}", file_name),
        file_name: file_name.to_string(),
    })
}

pub fn validator() -> IntakeValidator {
    IntakeValidator::new(MAX_FILE_SIZE, false)
}

pub fn orchestrator(
    source: impl StatusSource + 'static,
    downloader: impl Downloader + 'static,
) -> BatchOrchestrator {
    BatchOrchestrator::new(Arc::new(source), Arc::new(downloader), validator())
}

pub fn raw(name: &str) -> RawFile {
    RawFile::new(name, format!("contents of {}", name).into_bytes())
}

