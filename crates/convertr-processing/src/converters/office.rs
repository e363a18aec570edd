//! DOCX and XLSX documents, read and written as Office Open XML packages
//!
//! Text and cell values are pulled straight out of the package's XML parts.
//! Written packages carry only the parts a reader needs to open them, with
//! every spreadsheet cell stored as an inline string. Legacy binary DOC and
//! XLS files are not read.

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ConversionOptions, DocumentOptions, FormatTag};
use regex::Regex;
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::document::DocumentConverter;
use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

const DOCUMENT_PART: &str = "word/document.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const SHEET_PREFIX: &str = "xl/worksheets/sheet";

/// Worksheet limits of the file format
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMN_LETTERS: usize = 3;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="{target}"/></Relationships>"#;

const DOCX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const XLSX_CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

fn pattern(re: &str) -> Result<Regex, ConversionError> {
    Regex::new(re).map_err(|e| ConversionError::Decode(format!("Invalid pattern: {}", e)))
}

fn decode_err(e: impl std::fmt::Display) -> ConversionError {
    ConversionError::Decode(e.to_string())
}

fn encode_err(e: impl std::fmt::Display) -> ConversionError {
    ConversionError::Encode(e.to_string())
}

/// Replace the five predefined XML entities and numeric character references
pub(crate) fn unescape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find(';') else {
            out.push_str(tail);
            return out;
        };
        let entity = &tail[1..end];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                .and_then(Result::ok)
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => out.push(c),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' => out.push(c),
            // Not representable in XML 1.0
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

/// Attribute value `name="..."` from the inside of a start tag
fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let start = attrs
        .match_indices(&needle)
        .find(|(at, _)| *at == 0 || attrs[..*at].ends_with(char::is_whitespace))?
        .0
        + needle.len();
    let len = attrs[start..].find('"')?;
    Some(&attrs[start..start + len])
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>, ConversionError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(decode_err(e)),
    };
    let mut xml = String::new();
    file.read_to_string(&mut xml).map_err(decode_err)?;
    Ok(Some(xml))
}

fn write_package(parts: &[(&str, String)]) -> Result<Vec<u8>, ConversionError> {
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        writer.start_file(*name, options).map_err(encode_err)?;
        writer.write_all(body.as_bytes())?;
    }
    Ok(writer.finish().map_err(encode_err)?.into_inner())
}

/// Paragraphs of a DOCX body, in order. Tabs and line breaks inside a
/// paragraph are kept.
pub fn docx_paragraphs(data: &[u8]) -> Result<Vec<String>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(decode_err)?;
    let xml = read_part(&mut archive, DOCUMENT_PART)?
        .ok_or_else(|| ConversionError::Decode(format!("Missing {}", DOCUMENT_PART)))?;

    let paragraph = pattern(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>(.*?)</w:p>")?;
    let run = pattern(r"(?s)<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:(?:br|cr)(?:\s[^>]*)?/>")?;

    let paragraphs = paragraph
        .captures_iter(&xml)
        .map(|p| {
            let body = p.get(1).map_or("", |m| m.as_str());
            run.captures_iter(body)
                .map(|r| match r.get(1) {
                    Some(text) => unescape_xml(text.as_str()),
                    None if r[0].starts_with("<w:tab") => "\t".to_string(),
                    None => "\n".to_string(),
                })
                .collect::<String>()
        })
        .collect();
    Ok(paragraphs)
}

/// One paragraph per line of `text`
pub fn write_docx(text: &str) -> Result<Vec<u8>, ConversionError> {
    let mut body = String::new();
    for line in text.lines() {
        if line.is_empty() {
            body.push_str("<w:p/>");
        } else {
            body.push_str(&format!(
                "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                escape_xml(line)
            ));
        }
    }
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{}</w:body></w:document>",
        body
    );

    write_package(&[
        ("[Content_Types].xml", DOCX_CONTENT_TYPES.to_string()),
        ("_rels/.rels", RELS_XML.replace("{target}", "word/document.xml")),
        (DOCUMENT_PART, document),
    ])
}

/// Zero-based column index from a cell reference such as `AB12`
fn column_index(reference: &str) -> Option<usize> {
    let letters: String = reference.chars().take_while(char::is_ascii_alphabetic).collect();
    if letters.is_empty() || letters.len() > MAX_COLUMN_LETTERS {
        return None;
    }
    let number = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    Some(number - 1)
}

fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.iter().rev().map(|&b| b as char).collect()
}

fn first_sheet(archive: &ZipArchive<Cursor<&[u8]>>) -> Option<String> {
    archive
        .file_names()
        .filter_map(|name| {
            let number = name.strip_prefix(SHEET_PREFIX)?.strip_suffix(".xml")?;
            number.parse::<u32>().ok().map(|n| (n, name.to_string()))
        })
        .min()
        .map(|(_, name)| name)
}

/// Cell values of the first worksheet. Rows are padded to a rectangle and
/// gaps before the last used row become empty rows.
pub fn xlsx_rows(data: &[u8]) -> Result<Vec<Vec<String>>, ConversionError> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(decode_err)?;
    let sheet_name = first_sheet(&archive)
        .ok_or_else(|| ConversionError::Decode("Workbook has no worksheets".to_string()))?;
    let sheet = read_part(&mut archive, &sheet_name)?.unwrap_or_default();

    let text = pattern(r"(?s)<t(?:\s[^>]*)?>([^<]*)</t>")?;
    let shared: Vec<String> = match read_part(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => {
            let item = pattern(r"(?s)<si>(.*?)</si>|<si/>")?;
            item.captures_iter(&xml)
                .map(|si| {
                    let body = si.get(1).map_or("", |m| m.as_str());
                    text.captures_iter(body)
                        .map(|t| unescape_xml(&t[1]))
                        .collect()
                })
                .collect()
        }
        None => Vec::new(),
    };

    let row_re = pattern(r"(?s)<row(\s[^>]*)?/>|<row(\s[^>]*)?>(.*?)</row>")?;
    let cell_re = pattern(r"(?s)<c(\s[^>]*?)?/>|<c(\s[^>]*)?>(.*?)</c>")?;
    let value_re = pattern(r"(?s)<v>([^<]*)</v>")?;

    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in row_re.captures_iter(&sheet) {
        let attrs = row.get(1).or_else(|| row.get(2)).map_or("", |m| m.as_str());
        let index = attribute(attrs, "r")
            .and_then(|r| r.parse::<usize>().ok())
            .and_then(|r| r.checked_sub(1))
            .unwrap_or(rows.len());
        if index >= MAX_ROWS {
            return Err(ConversionError::Decode(format!("Row {} is out of range", index + 1)));
        }
        if index < rows.len() {
            continue;
        }
        rows.resize(index, Vec::new());

        let mut values: Vec<String> = Vec::new();
        let body = row.get(3).map_or("", |m| m.as_str());
        for cell in cell_re.captures_iter(body) {
            let attrs = cell.get(1).or_else(|| cell.get(2)).map_or("", |m| m.as_str());
            let column = attribute(attrs, "r")
                .and_then(column_index)
                .unwrap_or(values.len());
            let inner = cell.get(3).map_or("", |m| m.as_str());
            let raw = value_re.captures(inner).map(|v| unescape_xml(&v[1]));

            let value = match attribute(attrs, "t") {
                Some("s") => raw
                    .and_then(|i| i.trim().parse::<usize>().ok())
                    .and_then(|i| shared.get(i).cloned())
                    .unwrap_or_default(),
                Some("inlineStr") => text
                    .captures_iter(inner)
                    .map(|t| unescape_xml(&t[1]))
                    .collect(),
                Some("b") => match raw.as_deref() {
                    Some("1") => "TRUE".to_string(),
                    Some(_) => "FALSE".to_string(),
                    None => String::new(),
                },
                _ => raw.unwrap_or_default(),
            };

            if column >= values.len() {
                values.resize(column + 1, String::new());
            }
            values[column] = value;
        }
        rows.push(values);
    }

    while rows.last().is_some_and(|row| row.iter().all(String::is_empty)) {
        rows.pop();
    }
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }
    Ok(rows)
}

/// Single-sheet workbook with every value stored as an inline string
pub fn write_xlsx(rows: &[Vec<String>]) -> Result<Vec<u8>, ConversionError> {
    let mut sheet_data = String::new();
    for (r, row) in rows.iter().enumerate() {
        sheet_data.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet_data.push_str(&format!(
                "<c r=\"{}{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
                column_name(c),
                r + 1,
                escape_xml(value)
            ));
        }
        sheet_data.push_str("</row>");
    }
    let sheet = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n\
         <worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">\
         <sheetData>{}</sheetData></worksheet>",
        sheet_data
    );

    write_package(&[
        ("[Content_Types].xml", XLSX_CONTENT_TYPES.to_string()),
        ("_rels/.rels", RELS_XML.replace("{target}", "xl/workbook.xml")),
        ("xl/workbook.xml", WORKBOOK_XML.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS_XML.to_string()),
        ("xl/worksheets/sheet1.xml", sheet),
    ])
}

pub fn read_csv(data: &[u8]) -> Result<Vec<Vec<String>>, ConversionError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(decode_err)
        })
        .collect()
}

pub fn write_csv(rows: &[Vec<String>]) -> Result<Vec<u8>, ConversionError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).map_err(encode_err)?;
    }
    writer.into_inner().map_err(encode_err)
}

pub struct OfficeConverter;

impl OfficeConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn transform(
        data: &[u8],
        source: &FormatTag,
        target: &FormatTag,
        options: &DocumentOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        match (source.extension().as_str(), target.extension().as_str()) {
            ("docx", "txt") => Ok(docx_paragraphs(data)?.join("\n").into_bytes()),
            ("docx", "pdf") => {
                let text = docx_paragraphs(data)?.join("\n");
                Ok(DocumentConverter::render_text_pdf(text.as_bytes()))
            }
            ("pdf", "docx") => {
                let text = DocumentConverter::extract_pdf_text(data, options)?;
                write_docx(&String::from_utf8_lossy(&text))
            }
            ("txt", "docx") => write_docx(&String::from_utf8_lossy(data)),
            ("xlsx", "csv") => write_csv(&xlsx_rows(data)?),
            ("csv", "xlsx") => write_xlsx(&read_csv(data)?),
            _ => Err(ConversionError::not_implemented(source, target)),
        }
    }
}

impl Default for OfficeConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for OfficeConverter {
    fn name(&self) -> &'static str {
        "office"
    }

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool {
        matches!(
            (source.extension().as_str(), target.extension().as_str()),
            ("docx", "txt")
                | ("docx", "pdf")
                | ("pdf", "docx")
                | ("txt", "docx")
                | ("xlsx", "csv")
                | ("csv", "xlsx")
        )
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        let options = match &input.options {
            ConversionOptions::Document(options) => options.clone(),
            _ => DocumentOptions::default(),
        };
        let ConversionInput {
            data,
            source,
            target,
            ..
        } = input;

        let output = tokio::task::spawn_blocking(move || {
            Self::transform(&data, &source, &target, &options)
        })
        .await??;

        Ok(Bytes::from(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let owned: Vec<(&str, String)> = parts
            .iter()
            .map(|(name, body)| (*name, body.to_string()))
            .collect();
        write_package(&owned).unwrap()
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp; &#65;&#x42;"), "a <b> & AB");
        assert_eq!(unescape_xml("&bogus; & tail"), "&bogus; & tail");
    }

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_index("AA7"), Some(26));
        assert_eq!(column_index("c3"), Some(2));
        assert_eq!(column_index("12"), None);
        assert_eq!(column_index("ABCD1"), None);
    }

    #[test]
    fn test_docx_text_from_word_markup() {
        let document = r#"<w:document><w:body>
            <w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
            <w:p/>
            <w:p w14:paraId="1"><w:r><w:t>Cost</w:t><w:tab/><w:t>R&amp;D</w:t><w:br/><w:t>next</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let docx = package(&[(DOCUMENT_PART, document)]);

        let paragraphs = docx_paragraphs(&docx).unwrap();
        assert_eq!(paragraphs, vec!["Quarterly report", "", "Cost\tR&D\nnext"]);
    }

    #[test]
    fn test_docx_without_body_is_decode_error() {
        let docx = package(&[("word/styles.xml", "<w:styles/>")]);
        assert!(matches!(docx_paragraphs(&docx), Err(ConversionError::Decode(_))));
        assert!(matches!(
            docx_paragraphs(b"not a zip"),
            Err(ConversionError::Decode(_))
        ));
    }

    #[test]
    fn test_written_docx_reads_back() {
        let docx = write_docx("Title <draft>\n\nBody & more").unwrap();
        let paragraphs = docx_paragraphs(&docx).unwrap();
        assert_eq!(paragraphs, vec!["Title <draft>", "", "Body & more"]);

        let mut archive = ZipArchive::new(Cursor::new(docx.as_slice())).unwrap();
        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());
    }

    #[test]
    fn test_xlsx_cells_resolve_shared_strings_and_gaps() {
        let shared = r#"<sst><si><t>name</t></si><si><r><t>rich </t></r><r><t>text</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1"><v>42</v></c></row>
            <row r="3"><c r="B3" t="s"><v>1</v></c><c r="C3" t="b"><v>1</v></c><c r="D3" t="inlineStr"><is><t>x&lt;y</t></is></c></row>
        </sheetData></worksheet>"#;
        let xlsx = package(&[
            ("xl/worksheets/sheet2.xml", "<worksheet/>"),
            ("xl/worksheets/sheet1.xml", sheet),
            (SHARED_STRINGS_PART, shared),
        ]);

        assert_eq!(
            xlsx_rows(&xlsx).unwrap(),
            rows(&[
                &["name", "", "42", ""],
                &["", "", "", ""],
                &["", "rich text", "TRUE", "x<y"],
            ])
        );
    }

    #[test]
    fn test_xlsx_row_beyond_sheet_limit_is_rejected() {
        let sheet = r#"<worksheet><sheetData><row r="99999999"><c r="A99999999"><v>1</v></c></row></sheetData></worksheet>"#;
        let xlsx = package(&[("xl/worksheets/sheet1.xml", sheet)]);
        assert!(matches!(xlsx_rows(&xlsx), Err(ConversionError::Decode(_))));
    }

    #[test]
    fn test_xlsx_without_sheets_is_decode_error() {
        let xlsx = package(&[("xl/workbook.xml", WORKBOOK_XML)]);
        assert!(matches!(xlsx_rows(&xlsx), Err(ConversionError::Decode(_))));
    }

    #[test]
    fn test_csv_to_xlsx_and_back() {
        let csv = b"city,population\n\"Paris, FR\",2100000\nOslo\n";
        let options = DocumentOptions::default();

        let xlsx = OfficeConverter::transform(csv, &"csv".into(), &"xlsx".into(), &options).unwrap();
        assert_eq!(
            xlsx_rows(&xlsx).unwrap(),
            rows(&[
                &["city", "population"],
                &["Paris, FR", "2100000"],
                &["Oslo", ""],
            ])
        );

        let back = OfficeConverter::transform(&xlsx, &"xlsx".into(), &"csv".into(), &options).unwrap();
        assert_eq!(
            String::from_utf8(back).unwrap(),
            "city,population\n\"Paris, FR\",2100000\nOslo,\n"
        );
    }

    #[test]
    fn test_invalid_utf8_csv_is_decode_error() {
        let result = read_csv(b"ok,\xFF\xFE\n");
        assert!(matches!(result, Err(ConversionError::Decode(_))));
    }

    #[test]
    fn test_handles() {
        let converter = OfficeConverter::new();
        assert!(converter.handles(&"DOCX".into(), &"pdf".into()));
        assert!(converter.handles(&"pdf".into(), &"docx".into()));
        assert!(converter.handles(&"csv".into(), &"xlsx".into()));
        assert!(!converter.handles(&"doc".into(), &"txt".into()));
        assert!(!converter.handles(&"xls".into(), &"csv".into()));
        assert!(!converter.handles(&"csv".into(), &"xls".into()));
    }

    #[tokio::test]
    async fn test_docx_to_pdf() {
        let docx = write_docx("Hello from Word").unwrap();
        let pdf = OfficeConverter::new()
            .convert(ConversionInput {
                data: Bytes::from(docx),
                file_name: "letter.docx".to_string(),
                source: FormatTag::new("docx"),
                target: FormatTag::new("pdf"),
                options: ConversionOptions::Document(DocumentOptions::default()),
            })
            .await
            .unwrap();
        let rendered = String::from_utf8_lossy(&pdf);
        assert!(rendered.starts_with("%PDF-1.4"));
        assert!(rendered.contains("(Hello from Word) Tj"));
    }
}
