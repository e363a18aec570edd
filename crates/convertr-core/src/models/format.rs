//! Format capability table
//!
//! Static mapping from a source format to the legal target formats. Upload
//! intake, the conversion router and the supported-formats endpoint all read
//! from this one table so client and server can never disagree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Uppercase file-format tag such as `PNG` or `MP4`.
///
/// Always normalized on construction: surrounding whitespace and a leading
/// dot are stripped and the tag is uppercased, so `".png"`, `"png"` and
/// `"PNG"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FormatTag(String);

impl FormatTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().trim_start_matches('.').to_uppercase())
    }

    /// Tag used for files whose format could not be determined
    pub fn unknown() -> Self {
        Self("UNKNOWN".to_string())
    }

    /// Derive the tag from a file name's extension, if it has one
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.contains(['/', '\\']) {
            return None;
        }
        Some(Self::new(ext))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase form used for file extensions
    pub fn extension(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == "UNKNOWN" || self.0.is_empty()
    }

    pub fn category(&self) -> FormatCategory {
        FormatCategory::of(self)
    }
}

impl From<String> for FormatTag {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FormatTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<FormatTag> for String {
    fn from(value: FormatTag) -> Self {
        value.0
    }
}

impl Display for FormatTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

const IMAGE_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "bmp", "tiff", "gif", "svg", "ico",
];
const DOCUMENT_FORMATS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf", "odt", "epub", "mobi"];
const SPREADSHEET_FORMATS: &[&str] = &["xls", "xlsx", "csv", "ods"];
const PRESENTATION_FORMATS: &[&str] = &["ppt", "pptx", "odp"];
const VIDEO_FORMATS: &[&str] = &[
    "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "ogv", "m4v",
];
const AUDIO_FORMATS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "aiff", "au",
];
const ARCHIVE_FORMATS: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2"];

/// Targets offered for formats that were accepted but are not in any category
pub const FALLBACK_TARGETS: &[&str] = &["gz", "tar", "zip"];

const IMAGE_EXTRA_TARGETS: &[&str] = &["pdf"];
const VIDEO_EXTRA_TARGETS: &[&str] = &["mp3", "wav", "aac", "gif"];
const PDF_EXTRA_TARGETS: &[&str] = &["jpg", "png", "zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatCategory {
    Image,
    Document,
    Spreadsheet,
    Presentation,
    Video,
    Audio,
    Archive,
    Unknown,
}

impl FormatCategory {
    pub const KNOWN: [FormatCategory; 7] = [
        FormatCategory::Image,
        FormatCategory::Document,
        FormatCategory::Spreadsheet,
        FormatCategory::Presentation,
        FormatCategory::Video,
        FormatCategory::Audio,
        FormatCategory::Archive,
    ];

    /// Lowercase extensions that belong to this category
    pub fn formats(&self) -> &'static [&'static str] {
        match self {
            FormatCategory::Image => IMAGE_FORMATS,
            FormatCategory::Document => DOCUMENT_FORMATS,
            FormatCategory::Spreadsheet => SPREADSHEET_FORMATS,
            FormatCategory::Presentation => PRESENTATION_FORMATS,
            FormatCategory::Video => VIDEO_FORMATS,
            FormatCategory::Audio => AUDIO_FORMATS,
            FormatCategory::Archive => ARCHIVE_FORMATS,
            FormatCategory::Unknown => &[],
        }
    }

    pub fn of(tag: &FormatTag) -> Self {
        let ext = tag.extension();
        Self::KNOWN
            .into_iter()
            .find(|category| category.formats().contains(&ext.as_str()))
            .unwrap_or(FormatCategory::Unknown)
    }

    pub fn is_known(&self) -> bool {
        *self != FormatCategory::Unknown
    }
}

impl Display for FormatCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FormatCategory::Image => write!(f, "image"),
            FormatCategory::Document => write!(f, "document"),
            FormatCategory::Spreadsheet => write!(f, "spreadsheet"),
            FormatCategory::Presentation => write!(f, "presentation"),
            FormatCategory::Video => write!(f, "video"),
            FormatCategory::Audio => write!(f, "audio"),
            FormatCategory::Archive => write!(f, "archive"),
            FormatCategory::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for FormatCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(FormatCategory::Image),
            "document" => Ok(FormatCategory::Document),
            "spreadsheet" => Ok(FormatCategory::Spreadsheet),
            "presentation" => Ok(FormatCategory::Presentation),
            "video" => Ok(FormatCategory::Video),
            "audio" => Ok(FormatCategory::Audio),
            "archive" => Ok(FormatCategory::Archive),
            "unknown" => Ok(FormatCategory::Unknown),
            _ => Err(anyhow::anyhow!("Invalid format category: {}", s)),
        }
    }
}

/// Legal target formats for `source`, sorted and without duplicates.
///
/// Targets are every other member of the source's category plus a few
/// cross-category conversions. The source format itself is never listed.
/// Formats outside every category get [`FALLBACK_TARGETS`] so an accepted
/// file always has somewhere to go.
pub fn lookup_targets(source: &FormatTag) -> Vec<FormatTag> {
    let category = FormatCategory::of(source);
    if !category.is_known() {
        return FALLBACK_TARGETS.iter().map(FormatTag::new).collect();
    }

    let source_ext = source.extension();
    let mut targets: BTreeSet<&str> = category.formats().iter().copied().collect();

    match category {
        FormatCategory::Image => targets.extend(IMAGE_EXTRA_TARGETS),
        FormatCategory::Video => targets.extend(VIDEO_EXTRA_TARGETS),
        FormatCategory::Document if source_ext == "pdf" => targets.extend(PDF_EXTRA_TARGETS),
        _ => {}
    }
    targets.remove(source_ext.as_str());

    targets.into_iter().map(FormatTag::new).collect()
}

pub fn is_conversion_supported(source: &FormatTag, target: &FormatTag) -> bool {
    lookup_targets(source).contains(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<FormatTag> {
        values.iter().map(FormatTag::new).collect()
    }

    #[test]
    fn test_format_tag_normalizes() {
        assert_eq!(FormatTag::new(".png"), FormatTag::new("PNG"));
        assert_eq!(FormatTag::new(" jpg ").as_str(), "JPG");
        assert_eq!(FormatTag::new("Mp4").extension(), "mp4");
    }

    #[test]
    fn test_format_tag_from_file_name() {
        assert_eq!(
            FormatTag::from_file_name("holiday.photo.JPG"),
            Some(FormatTag::new("jpg"))
        );
        assert_eq!(FormatTag::from_file_name("README"), None);
        assert_eq!(FormatTag::from_file_name(".bashrc"), None);
        assert_eq!(FormatTag::from_file_name("trailing."), None);
    }

    #[test]
    fn test_format_tag_serializes_as_string() {
        let json = serde_json::to_string(&FormatTag::new("webp")).unwrap();
        assert_eq!(json, "\"WEBP\"");
        let tag: FormatTag = serde_json::from_str("\"mp3\"").unwrap();
        assert_eq!(tag.as_str(), "MP3");
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(FormatCategory::of(&"png".into()), FormatCategory::Image);
        assert_eq!(FormatCategory::of(&"DOCX".into()), FormatCategory::Document);
        assert_eq!(FormatCategory::of(&"csv".into()), FormatCategory::Spreadsheet);
        assert_eq!(FormatCategory::of(&"odp".into()), FormatCategory::Presentation);
        assert_eq!(FormatCategory::of(&"mkv".into()), FormatCategory::Video);
        assert_eq!(FormatCategory::of(&"flac".into()), FormatCategory::Audio);
        assert_eq!(FormatCategory::of(&"7z".into()), FormatCategory::Archive);
        assert_eq!(FormatCategory::of(&"xyz".into()), FormatCategory::Unknown);
    }

    #[test]
    fn test_category_display_round_trips() {
        for category in FormatCategory::KNOWN {
            let parsed: FormatCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("pictures".parse::<FormatCategory>().is_err());
    }

    #[test]
    fn test_jpg_targets_include_pdf_and_exclude_self() {
        let targets = lookup_targets(&"jpg".into());
        assert!(targets.contains(&"PNG".into()));
        assert!(targets.contains(&"WEBP".into()));
        assert!(targets.contains(&"JPEG".into()));
        assert!(targets.contains(&"PDF".into()));
        assert!(!targets.contains(&"JPG".into()));
    }

    #[test]
    fn test_video_targets_include_audio_extraction() {
        let targets = lookup_targets(&"mp4".into());
        for expected in ["MP3", "WAV", "AAC", "GIF", "WEBM", "MOV"] {
            assert!(targets.contains(&expected.into()), "missing {expected}");
        }
        assert!(!targets.contains(&"MP4".into()));
        assert!(!targets.contains(&"FLAC".into()));
    }

    #[test]
    fn test_pdf_targets_include_raster_and_zip() {
        let targets = lookup_targets(&"pdf".into());
        for expected in ["JPG", "PNG", "ZIP", "DOCX", "TXT"] {
            assert!(targets.contains(&expected.into()), "missing {expected}");
        }
        assert!(!targets.contains(&"PDF".into()));
    }

    #[test]
    fn test_non_pdf_documents_have_no_cross_targets() {
        let targets = lookup_targets(&"docx".into());
        assert!(!targets.contains(&"ZIP".into()));
        assert!(!targets.contains(&"PNG".into()));
    }

    #[test]
    fn test_audio_targets_stay_in_category() {
        let targets = lookup_targets(&"wav".into());
        assert_eq!(
            targets,
            tags(&["aac", "aiff", "au", "flac", "m4a", "mp3", "ogg", "wma"])
        );
    }

    #[test]
    fn test_unknown_format_gets_fallback_targets() {
        assert_eq!(lookup_targets(&"xyz".into()), tags(&["gz", "tar", "zip"]));
        assert_eq!(
            lookup_targets(&FormatTag::unknown()),
            tags(&["gz", "tar", "zip"])
        );
    }

    #[test]
    fn test_targets_are_sorted_and_unique() {
        for category in FormatCategory::KNOWN {
            for format in category.formats() {
                let targets = lookup_targets(&FormatTag::new(format));
                let mut sorted = targets.clone();
                sorted.sort();
                sorted.dedup();
                assert_eq!(targets, sorted, "targets for {format} not canonical");
                assert!(!targets.is_empty(), "no targets for {format}");
            }
        }
    }

    #[test]
    fn test_is_conversion_supported() {
        assert!(is_conversion_supported(&"png".into(), &"jpg".into()));
        assert!(is_conversion_supported(&"mov".into(), &"mp3".into()));
        assert!(!is_conversion_supported(&"mp3".into(), &"mp4".into()));
        assert!(!is_conversion_supported(&"png".into(), &"png".into()));
    }
}
