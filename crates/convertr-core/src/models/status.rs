//! Status messages pushed or polled for a single conversion job

use serde::{Deserialize, Serialize};

/// One status update for a job.
///
/// The wire shape is a bare object whose fields identify the kind:
/// `{"progress": 40}`, `{"completed": true, "downloadUrl": "...", "fileName": "..."}`
/// or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusMessage {
    Completed {
        completed: bool,
        #[serde(rename = "downloadUrl")]
        download_url: String,
        #[serde(rename = "fileName", default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    Error {
        error: String,
    },
    Progress {
        progress: u8,
    },
}

impl StatusMessage {
    pub fn progress(percent: u8) -> Self {
        StatusMessage::Progress { progress: percent }
    }

    pub fn completed(download_url: impl Into<String>, file_name: impl Into<String>) -> Self {
        StatusMessage::Completed {
            completed: true,
            download_url: download_url.into(),
            file_name: Some(file_name.into()),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        StatusMessage::Error {
            error: detail.into(),
        }
    }

    /// No further messages follow a terminal one
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StatusMessage::Progress { .. })
    }
}
