//! Multipart and download helpers shared by the file handlers

use axum::extract::Multipart;
use convertr_core::constants::UPLOAD_FIELD_NAMES;
use convertr_core::AppError;
use convertr_processing::RawFile;

/// Collect every file part named `file` or `files`. Other fields are ignored.
/// A form without any file part is rejected.
pub async fn extract_multipart_files(mut multipart: Multipart) -> Result<Vec<RawFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default();
        if !UPLOAD_FIELD_NAMES.contains(&field_name) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s: &str| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?;

        files.push(RawFile::new(filename, data));
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(
            "No file provided; send one or more fields named 'file'".to_string(),
        ));
    }

    Ok(files)
}

/// `Content-Disposition` value offering `file_name` as an attachment.
/// Characters that cannot appear in a quoted header value become `_`.
pub fn attachment_disposition(file_name: &str) -> String {
    let safe: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() || !c.is_ascii() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_disposition_quotes_name() {
        assert_eq!(
            attachment_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn test_attachment_disposition_escapes_quotes_and_controls() {
        assert_eq!(
            attachment_disposition("a\"b\r\n.txt"),
            "attachment; filename=\"a_b__.txt\""
        );
    }
}
