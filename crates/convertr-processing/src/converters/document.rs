//! Text extraction from PDF and plain-text rendering to PDF

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ConversionOptions, DocumentOptions, FormatTag};

use super::pdf::{escape_text, PdfBuilder, PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

const MARGIN: u32 = 72;
const FONT_SIZE: u32 = 10;
const LEADING: u32 = 12;
const WRAP_COLUMNS: usize = 95;

pub struct DocumentConverter;

impl DocumentConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_pdf_text(
        data: &[u8],
        options: &DocumentOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| ConversionError::Decode(e.to_string()))?;

        let text = if options.collapse_whitespace {
            collapse_whitespace(&text)
        } else {
            text
        };
        Ok(text.into_bytes())
    }

    /// Lay text out in a monospaced-ish column, one page per screenful
    pub fn render_text_pdf(data: &[u8]) -> Vec<u8> {
        let text = String::from_utf8_lossy(data);
        let lines: Vec<String> = text.lines().flat_map(wrap_line).collect();
        let lines_per_page = ((PAGE_HEIGHT - 2 * MARGIN) / LEADING) as usize;

        let mut pdf = PdfBuilder::new();
        let pages_id = pdf.reserve();
        let font_id = pdf.add("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>");

        let empty: &[String] = &[];
        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![empty]
        } else {
            lines.chunks(lines_per_page).collect()
        };

        let mut page_ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let mut content = format!(
                "BT\n/F1 {FONT_SIZE} Tf\n{LEADING} TL\n{MARGIN} {} Td\n",
                PAGE_HEIGHT - MARGIN
            );
            for line in chunk {
                content.push_str(&format!("({}) Tj\nT*\n", escape_text(line)));
            }
            content.push_str("ET\n");

            let content_id = pdf.add_stream("", content.as_bytes());
            page_ids.push(pdf.add(format!(
                "<< /Type /Page /Parent {pages_id} 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                 /Resources << /Font << /F1 {font_id} 0 R >> >> /Contents {content_id} 0 R >>"
            )));
        }

        pdf.finish(pages_id, &page_ids)
    }
}

impl Default for DocumentConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(WRAP_COLUMNS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Converter for DocumentConverter {
    fn name(&self) -> &'static str {
        "document"
    }

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool {
        matches!(
            (source.extension().as_str(), target.extension().as_str()),
            ("pdf", "txt") | ("txt", "pdf")
        )
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        let options = match &input.options {
            ConversionOptions::Document(options) => options.clone(),
            _ => DocumentOptions::default(),
        };
        let source = input.source.extension();
        let target = input.target.extension();
        let data = input.data;

        let output = match (source.as_str(), target.as_str()) {
            ("pdf", "txt") => {
                tokio::task::spawn_blocking(move || Self::extract_pdf_text(&data, &options))
                    .await??
            }
            ("txt", "pdf") => {
                tokio::task::spawn_blocking(move || Self::render_text_pdf(&data)).await?
            }
            _ => return Err(ConversionError::not_implemented(&input.source, &input.target)),
        };

        Ok(Bytes::from(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles() {
        let converter = DocumentConverter::new();
        assert!(converter.handles(&"pdf".into(), &"txt".into()));
        assert!(converter.handles(&"TXT".into(), &"pdf".into()));
        assert!(!converter.handles(&"docx".into(), &"pdf".into()));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(
            collapse_whitespace("  a   b \n\n\t c  \n"),
            "a b\nc".to_string()
        );
    }

    #[test]
    fn test_wrap_line() {
        let long = "x".repeat(WRAP_COLUMNS * 2 + 3);
        let wrapped = wrap_line(&long);
        assert_eq!(wrapped.len(), 3);
        assert_eq!(wrapped[2], "xxx");
        assert_eq!(wrap_line(""), vec![String::new()]);
    }

    #[test]
    fn test_render_text_pdf_paginates() {
        let text: String = (0..120).map(|i| format!("line {i}\n")).collect();
        let pdf = DocumentConverter::render_text_pdf(text.as_bytes());
        let rendered = String::from_utf8_lossy(&pdf);
        assert!(rendered.starts_with("%PDF-1.4"));
        assert!(rendered.contains("/Count 3"));
        assert!(rendered.contains("(line 0) Tj"));
        assert!(rendered.contains("(line 119) Tj"));
    }

    #[tokio::test]
    async fn test_txt_to_pdf() {
        let pdf = DocumentConverter::new()
            .convert(ConversionInput {
                data: Bytes::from_static(b"Hello (convertr)"),
                file_name: "notes.txt".to_string(),
                source: FormatTag::new("txt"),
                target: FormatTag::new("pdf"),
                options: ConversionOptions::Document(DocumentOptions::default()),
            })
            .await
            .unwrap();
        let rendered = String::from_utf8_lossy(&pdf);
        assert!(rendered.contains("(Hello \\(convertr\\)) Tj"));
        assert!(rendered.contains("/BaseFont /Helvetica"));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_decode_error() {
        let result = DocumentConverter::new()
            .convert(ConversionInput {
                data: Bytes::from_static(b"%PDF-1.4 garbage"),
                file_name: "bad.pdf".to_string(),
                source: FormatTag::new("pdf"),
                target: FormatTag::new("txt"),
                options: ConversionOptions::Document(DocumentOptions::default()),
            })
            .await;
        assert!(matches!(
            result,
            Err(ConversionError::Decode(_)) | Err(ConversionError::Crashed(_))
        ));
    }
}
