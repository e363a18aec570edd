use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::{lookup_targets, FormatCategory, FormatTag};
use super::info::FileInfo;

/// A file accepted by intake. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub original_name: String,
    pub source_format: FormatTag,
    pub size_bytes: u64,
    pub category: FormatCategory,
    pub supported_target_formats: Vec<FormatTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<FileInfo>,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, source_format: FormatTag, size_bytes: u64) -> Self {
        Self::with_id(Uuid::new_v4(), original_name, source_format, size_bytes)
    }

    pub fn with_id(
        id: Uuid,
        original_name: impl Into<String>,
        source_format: FormatTag,
        size_bytes: u64,
    ) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            category: source_format.category(),
            supported_target_formats: lookup_targets(&source_format),
            source_format,
            size_bytes,
            file_info: None,
        }
    }

    pub fn with_file_info(mut self, info: FileInfo) -> Self {
        self.file_info = Some(info);
        self
    }

    pub fn supports_target(&self, target: &FormatTag) -> bool {
        self.supported_target_formats.contains(target)
    }

    /// Name for the converted output: original stem plus the target extension
    pub fn output_name(&self, target: &FormatTag) -> String {
        let stem = match self.original_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.original_name.as_str(),
        };
        format!("{}.{}", stem, target.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_computes_targets_and_category() {
        let file = UploadedFile::new("photo.png", FormatTag::new("png"), 2048);
        assert_eq!(file.category, FormatCategory::Image);
        assert!(file.supports_target(&FormatTag::new("jpg")));
        assert!(!file.supports_target(&FormatTag::new("png")));
        assert!(!file.supports_target(&FormatTag::new("mp3")));
    }

    #[test]
    fn test_output_name() {
        let file = UploadedFile::new("archive.2024.mov", FormatTag::new("mov"), 10);
        assert_eq!(file.output_name(&FormatTag::new("MP4")), "archive.2024.mp4");

        let bare = UploadedFile::new("README", FormatTag::unknown(), 10);
        assert_eq!(bare.output_name(&FormatTag::new("zip")), "README.zip");
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let file = UploadedFile::new("a.mp3", FormatTag::new("mp3"), 1);
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["originalName"], "a.mp3");
        assert_eq!(json["sourceFormat"], "MP3");
        assert_eq!(json["category"], "audio");
        assert!(json["supportedTargetFormats"].is_array());
        assert!(json.get("fileInfo").is_none());

        let described = file.with_file_info(FileInfo::new(1, FormatCategory::Audio));
        let json = serde_json::to_value(&described).unwrap();
        assert_eq!(json["fileInfo"]["sizeBytes"], 1);
    }
}
