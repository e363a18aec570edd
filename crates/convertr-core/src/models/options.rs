//! Per-category conversion options
//!
//! Options are a closed set: each source category carries its own typed
//! record and the variant must match the category of the file being converted.

use serde::{Deserialize, Serialize};

use super::format::FormatCategory;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionOptions {
    Image(ImageOptions),
    Audio(AudioOptions),
    Video(VideoOptions),
    Document(DocumentOptions),
    Archive(ArchiveOptions),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageOptions {
    /// Encoder quality for lossy targets, 1-100
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            quality: 95,
            max_width: None,
            max_height: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioOptions {
    pub bitrate_kbps: Option<u32>,
    pub sample_rate_hz: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoOptions {
    /// Downscale to this height, keeping the aspect ratio
    pub max_height: Option<u32>,
    pub audio_bitrate_kbps: Option<u32>,
    /// Frame rate used when rendering an animated GIF
    pub gif_fps: u8,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            max_height: None,
            audio_bitrate_kbps: None,
            gif_fps: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentOptions {
    /// Collapse runs of whitespace in extracted text
    pub collapse_whitespace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArchiveOptions {
    /// 0 (store) to 9 (smallest)
    pub compression_level: u32,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
        }
    }
}

impl ConversionOptions {
    /// Default options for files of the given source category
    pub fn for_category(category: FormatCategory) -> Self {
        match category {
            FormatCategory::Image => ConversionOptions::Image(ImageOptions::default()),
            FormatCategory::Audio => ConversionOptions::Audio(AudioOptions::default()),
            FormatCategory::Video => ConversionOptions::Video(VideoOptions::default()),
            FormatCategory::Document
            | FormatCategory::Spreadsheet
            | FormatCategory::Presentation => {
                ConversionOptions::Document(DocumentOptions::default())
            }
            FormatCategory::Archive | FormatCategory::Unknown => {
                ConversionOptions::Archive(ArchiveOptions::default())
            }
        }
    }

    pub fn applies_to(&self, category: FormatCategory) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&Self::for_category(category))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConversionOptions::Image(_) => "image",
            ConversionOptions::Audio(_) => "audio",
            ConversionOptions::Video(_) => "video",
            ConversionOptions::Document(_) => "document",
            ConversionOptions::Archive(_) => "archive",
        }
    }
}
