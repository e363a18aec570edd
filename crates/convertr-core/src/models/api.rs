//! Request and response bodies exchanged between the server and its clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::{FormatCategory, FormatTag};
use super::job::JobStatus;
use super::options::ConversionOptions;
use super::status::StatusMessage;
use super::upload::UploadedFile;

/// A file intake refused, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedUpload {
    pub original_name: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
    #[serde(default)]
    pub errors: Vec<RejectedUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    pub file_id: Uuid,
    pub target_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ConversionOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertAccepted {
    pub job_id: Uuid,
    pub status: String,
}

impl ConvertAccepted {
    pub fn processing(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: "processing".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConvertRequest {
    pub items: Vec<ConvertRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConvertItem {
    pub file_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConvertResponse {
    pub jobs: Vec<BatchConvertItem>,
}

/// Server-side view of one conversion job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub original_name: String,
    pub source_format: FormatTag,
    pub target_format: Option<FormatTag>,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobStatusResponse {
    /// The status message a push subscriber would have received last
    pub fn to_message(&self) -> StatusMessage {
        match self.status {
            JobStatus::Ready | JobStatus::Converting => StatusMessage::progress(self.progress),
            JobStatus::Completed => StatusMessage::Completed {
                completed: true,
                download_url: self.download_url.clone().unwrap_or_default(),
                file_name: self.file_name.clone(),
            },
            JobStatus::Failed => StatusMessage::error(
                self.error
                    .clone()
                    .unwrap_or_else(|| "Conversion failed".to_string()),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobStatusResponse>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedFormatsResponse {
    pub source_format: FormatTag,
    pub category: FormatCategory,
    pub supported_formats: Vec<FormatTag>,
}
