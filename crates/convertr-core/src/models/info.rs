//! Descriptive metadata read from an uploaded file's contents

use serde::{Deserialize, Serialize};

use super::format::FormatCategory;

/// Whatever could be learned about a file without converting it. Only the
/// fields that apply to the file's format are filled in; `error` carries the
/// reason when the contents could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub size_bytes: u64,
    pub category: FormatCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileInfo {
    pub fn new(size_bytes: u64, category: FormatCategory) -> Self {
        Self {
            size_bytes,
            category,
            width: None,
            height: None,
            page_count: None,
            title: None,
            author: None,
            line_count: None,
            paragraph_count: None,
            word_count: None,
            row_count: None,
            column_count: None,
            entry_count: None,
            channels: None,
            sample_rate: None,
            bits_per_sample: None,
            duration_ms: None,
            error: None,
        }
    }
}
