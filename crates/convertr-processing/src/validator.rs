//! Upload intake validation
//!
//! Turns raw (name, bytes) pairs into [`UploadedFile`]s or per-file
//! rejections. Used by the server on multipart upload and by the client
//! before it queues anything, so both sides apply the same rules.

use bytes::Bytes;
use convertr_core::models::{FormatTag, RejectedUpload, UploadedFile};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
}

impl ValidationError {
    /// Machine-readable code reported alongside each rejected file
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ValidationError::EmptyFile => "EMPTY_FILE",
            ValidationError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ValidationError::InvalidFilename(_) => "INVALID_FILENAME",
        }
    }
}

/// A file as received, before validation
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub data: Bytes,
}

impl RawFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcceptedFile {
    pub file: UploadedFile,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct RejectedFile {
    pub original_name: String,
    pub error: ValidationError,
}

impl From<&RejectedFile> for RejectedUpload {
    fn from(rejected: &RejectedFile) -> Self {
        RejectedUpload {
            original_name: rejected.original_name.clone(),
            code: rejected.error.code().to_string(),
            message: rejected.error.to_string(),
        }
    }
}

/// Outcome of validating a batch. Accepted files keep their input order.
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<AcceptedFile>,
    pub rejected: Vec<RejectedFile>,
}

const MAX_FILENAME_LEN: usize = 255;

#[derive(Debug, Clone)]
pub struct IntakeValidator {
    max_file_size: u64,
    strict_formats: bool,
}

impl IntakeValidator {
    /// `strict_formats` rejects files whose format is outside every category
    /// instead of accepting them with the fallback targets.
    pub fn new(max_file_size: u64, strict_formats: bool) -> Self {
        Self {
            max_file_size,
            strict_formats,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Strip any directory components and reject names that are empty or
    /// unreasonably long
    pub fn sanitize_filename(&self, name: &str) -> Result<String, ValidationError> {
        let base = name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default()
            .trim();
        if base.is_empty() || base == "." || base == ".." {
            return Err(ValidationError::InvalidFilename(name.to_string()));
        }
        if base.len() > MAX_FILENAME_LEN || base.chars().any(char::is_control) {
            return Err(ValidationError::InvalidFilename(name.to_string()));
        }
        Ok(base.to_string())
    }

    /// Format from the file extension, falling back to content sniffing, then `UNKNOWN`
    pub fn detect_format(&self, name: &str, data: &[u8]) -> FormatTag {
        FormatTag::from_file_name(name)
            .or_else(|| sniff_format(data).map(FormatTag::new))
            .unwrap_or_else(FormatTag::unknown)
    }

    pub fn validate(&self, name: &str, data: &[u8]) -> Result<UploadedFile, ValidationError> {
        let name = self.sanitize_filename(name)?;
        self.validate_file_size(data.len() as u64)?;

        let format = self.detect_format(&name, data);
        if self.strict_formats && !format.category().is_known() {
            return Err(ValidationError::UnsupportedFormat(format.to_string()));
        }

        let info = crate::info::inspect(data, &format);
        Ok(UploadedFile::new(name, format, data.len() as u64).with_file_info(info))
    }

    /// Validate every file independently. One bad file never blocks the rest.
    pub fn ingest(&self, files: Vec<RawFile>) -> IntakeReport {
        let mut report = IntakeReport::default();

        for raw in files {
            match self.validate(&raw.name, &raw.data) {
                Ok(file) => {
                    tracing::debug!(
                        file_id = %file.id,
                        name = %file.original_name,
                        format = %file.source_format,
                        size_bytes = file.size_bytes,
                        "File accepted"
                    );
                    report.accepted.push(AcceptedFile {
                        file,
                        data: raw.data,
                    });
                }
                Err(error) => {
                    tracing::debug!(name = %raw.name, error = %error, "File rejected");
                    report.rejected.push(RejectedFile {
                        original_name: raw.name,
                        error,
                    });
                }
            }
        }

        report
    }
}

/// Identify a handful of common formats by their leading bytes
pub fn sniff_format(data: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF", "pdf"),
        (b"\x89PNG\r\n\x1a\n", "png"),
        (b"\xFF\xD8\xFF", "jpg"),
        (b"GIF87a", "gif"),
        (b"GIF89a", "gif"),
        (b"PK\x03\x04", "zip"),
        (b"ID3", "mp3"),
        (b"OggS", "ogg"),
        (b"fLaC", "flac"),
        (b"\x1F\x8B", "gz"),
        (b"BM", "bmp"),
    ];

    if let Some(format) = SIGNATURES
        .iter()
        .find(|(signature, _)| data.starts_with(signature))
        .map(|(_, format)| *format)
    {
        return Some(format);
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        return match &data[8..12] {
            b"WEBP" => Some("webp"),
            b"WAVE" => Some("wav"),
            b"AVI " => Some("avi"),
            _ => None,
        };
    }

    if data.len() >= 8 && &data[4..8] == b"ftyp" {
        return Some("mp4");
    }

    // MPEG audio frame sync without an ID3 header
    if data.len() >= 2 && data[0] == 0xFF && (data[1] & 0xE0) == 0xE0 {
        return Some("mp3");
    }

    None
}
