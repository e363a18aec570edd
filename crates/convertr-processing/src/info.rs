//! Metadata read from an upload's contents at intake
//!
//! Inspection never rejects a file. Anything that cannot be read is
//! reported in [`FileInfo::error`] and the upload goes ahead.

use convertr_core::models::{FileInfo, FormatTag};

use crate::error::ConversionError;

/// Describe `data` as a file of `format`
pub fn inspect(data: &[u8], format: &FormatTag) -> FileInfo {
    let mut info = FileInfo::new(data.len() as u64, format.category());

    let result = match format.extension().as_str() {
        "pdf" => {
            describe_pdf(data, &mut info);
            Ok(())
        }
        "txt" => {
            describe_text(data, &mut info);
            Ok(())
        }
        "wav" => describe_wav(data, &mut info),
        #[cfg(feature = "image")]
        "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" | "gif" | "ico" => {
            describe_image(data, &mut info)
        }
        #[cfg(feature = "archive")]
        "zip" => describe_zip(data, &mut info),
        #[cfg(feature = "office")]
        "docx" => describe_docx(data, &mut info),
        #[cfg(feature = "office")]
        "xlsx" => crate::converters::office::xlsx_rows(data)
            .map(|rows| describe_rows(&rows, &mut info)),
        #[cfg(feature = "office")]
        "csv" => crate::converters::office::read_csv(data)
            .map(|rows| describe_rows(&rows, &mut info)),
        _ => Ok(()),
    };

    if let Err(e) = result {
        tracing::debug!(format = %format, error = %e, "Could not inspect file");
        info.error = Some(e.to_string());
    }
    info
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Value of a literal string that follows `key`, as in `/Title (Report)`
fn pdf_string(text: &str, key: &str) -> Option<String> {
    let after = text.split(key).nth(1)?.trim_start();
    let body = after.strip_prefix('(')?;
    let value: String = body.chars().take_while(|c| *c != ')').collect();
    Some(value).filter(|v| !v.is_empty())
}

/// Page count, title and author from the raw object text, without parsing
/// content streams
fn describe_pdf(data: &[u8], info: &mut FileInfo) {
    let text = String::from_utf8_lossy(data);
    info.page_count = text.split("/Count").skip(1).find_map(|rest| {
        let digits: String = rest
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    });
    info.title = pdf_string(&text, "/Title");
    info.author = pdf_string(&text, "/Author");
}

fn describe_text(data: &[u8], info: &mut FileInfo) {
    let text = String::from_utf8_lossy(data);
    info.line_count = Some(text.lines().count() as u64);
    info.word_count = Some(word_count(&text));
}

fn u16_le(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn u32_le(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Walk the RIFF chunks for the format block and the sample data size
fn describe_wav(data: &[u8], info: &mut FileInfo) -> Result<(), ConversionError> {
    if !data.starts_with(b"RIFF") || data.get(8..12) != Some(b"WAVE".as_slice()) {
        return Err(ConversionError::Decode("Not a RIFF/WAVE file".to_string()));
    }

    let mut byte_rate = None;
    let mut data_len = None;
    let mut at = 12;
    while let Some(chunk) = data.get(at..).filter(|rest| rest.len() >= 8) {
        let len = u32_le(chunk, 4).unwrap_or(0);
        match &chunk[..4] {
            b"fmt " => {
                info.channels = u16_le(chunk, 10);
                info.sample_rate = u32_le(chunk, 12);
                byte_rate = u32_le(chunk, 16);
                info.bits_per_sample = u16_le(chunk, 22);
            }
            b"data" => data_len = Some(len),
            _ => {}
        }
        // Chunks are padded to an even length
        at = at
            .saturating_add(8)
            .saturating_add(len as usize)
            .saturating_add(len as usize & 1);
    }

    match (byte_rate, data_len) {
        (Some(rate), Some(len)) if rate > 0 => {
            info.duration_ms = Some(u64::from(len) * 1000 / u64::from(rate));
            Ok(())
        }
        (None, _) => Err(ConversionError::Decode("Missing fmt chunk".to_string())),
        _ => Ok(()),
    }
}

#[cfg(feature = "image")]
fn describe_image(data: &[u8], info: &mut FileInfo) -> Result<(), ConversionError> {
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| ConversionError::Decode(e.to_string()))?;
    info.width = Some(width);
    info.height = Some(height);
    Ok(())
}

#[cfg(feature = "archive")]
fn describe_zip(data: &[u8], info: &mut FileInfo) -> Result<(), ConversionError> {
    let archive = zip::ZipArchive::new(std::io::Cursor::new(data))
        .map_err(|e| ConversionError::Decode(e.to_string()))?;
    info.entry_count = Some(archive.len() as u64);
    Ok(())
}

#[cfg(feature = "office")]
fn describe_docx(data: &[u8], info: &mut FileInfo) -> Result<(), ConversionError> {
    let paragraphs = crate::converters::office::docx_paragraphs(data)?;
    info.paragraph_count = Some(paragraphs.iter().filter(|p| !p.trim().is_empty()).count() as u64);
    info.word_count = Some(paragraphs.iter().map(|p| word_count(p)).sum());
    Ok(())
}

#[cfg(feature = "office")]
fn describe_rows(rows: &[Vec<String>], info: &mut FileInfo) {
    info.row_count = Some(rows.len() as u64);
    info.column_count = Some(rows.iter().map(Vec::len).max().unwrap_or(0) as u64);
}
