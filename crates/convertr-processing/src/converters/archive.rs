//! ZIP, TAR and GZ packaging
//!
//! Any file can be packed into one of the three archive formats. ZIP and TAR
//! sources are repacked entry by entry when the target is the other of the
//! two; everything else becomes a single-entry archive named after the
//! original file.

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ArchiveOptions, ConversionOptions, FormatTag};
use flate2::{Compression, GzBuilder};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

const PACKAGE_TARGETS: &[&str] = &["zip", "tar", "gz"];

struct Entry {
    name: String,
    data: Vec<u8>,
}

pub struct ArchiveConverter;

impl ArchiveConverter {
    pub fn new() -> Self {
        Self
    }

    fn level(options: &ArchiveOptions) -> u32 {
        options.compression_level.min(9)
    }

    fn read_zip(data: &[u8]) -> Result<Vec<Entry>, ConversionError> {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| ConversionError::Decode(e.to_string()))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| ConversionError::Decode(e.to_string()))?;
            if file.is_dir() {
                continue;
            }
            let Some(name) = file
                .enclosed_name()
                .map(|path| path.to_string_lossy().into_owned())
            else {
                tracing::warn!(entry = %file.name(), "Skipping zip entry with unsafe path");
                continue;
            };
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)?;
            entries.push(Entry {
                name,
                data: contents,
            });
        }
        Ok(entries)
    }

    fn read_tar(data: &[u8]) -> Result<Vec<Entry>, ConversionError> {
        let mut archive = tar::Archive::new(Cursor::new(data));
        let mut entries = Vec::new();
        for entry in archive
            .entries()
            .map_err(|e| ConversionError::Decode(e.to_string()))?
        {
            let mut entry = entry.map_err(|e| ConversionError::Decode(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .map_err(|e| ConversionError::Decode(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents)?;
            entries.push(Entry {
                name,
                data: contents,
            });
        }
        Ok(entries)
    }

    fn write_zip(entries: &[Entry], level: u32) -> Result<Vec<u8>, ConversionError> {
        let options = if level == 0 {
            FileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            FileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(level as i32))
        };

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(|e| ConversionError::Encode(e.to_string()))?;
            writer.write_all(&entry.data)?;
        }
        let cursor = writer
            .finish()
            .map_err(|e| ConversionError::Encode(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    fn write_tar(entries: &[Entry]) -> Result<Vec<u8>, ConversionError> {
        let mtime = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut builder = tar::Builder::new(Vec::new());
        for entry in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(entry.data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(mtime);
            builder.append_data(&mut header, &entry.name, entry.data.as_slice())?;
        }
        Ok(builder.into_inner()?)
    }

    fn write_gz(name: &str, data: &[u8], level: u32) -> Result<Vec<u8>, ConversionError> {
        let mut encoder = GzBuilder::new()
            .filename(name.as_bytes())
            .write(Vec::new(), Compression::new(level));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    pub fn package(
        data: &[u8],
        file_name: &str,
        source: &FormatTag,
        target: &FormatTag,
        options: &ArchiveOptions,
    ) -> Result<Vec<u8>, ConversionError> {
        let level = Self::level(options);
        let single = || {
            vec![Entry {
                name: file_name.to_string(),
                data: data.to_vec(),
            }]
        };

        match (source.extension().as_str(), target.extension().as_str()) {
            ("tar", "zip") => Self::write_zip(&Self::read_tar(data)?, level),
            ("zip", "tar") => Self::write_tar(&Self::read_zip(data)?),
            (_, "zip") => Self::write_zip(&single(), level),
            (_, "tar") => Self::write_tar(&single()),
            (_, "gz") => Self::write_gz(file_name, data, level),
            _ => Err(ConversionError::not_implemented(source, target)),
        }
    }
}

impl Default for ArchiveConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Converter for ArchiveConverter {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool {
        source != target && PACKAGE_TARGETS.contains(&target.extension().as_str())
    }

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        let options = match &input.options {
            ConversionOptions::Archive(options) => options.clone(),
            _ => ArchiveOptions::default(),
        };
        let ConversionInput {
            data,
            file_name,
            source,
            target,
            ..
        } = input;

        let output = tokio::task::spawn_blocking(move || {
            Self::package(&data, &file_name, &source, &target, &options)
        })
        .await??;

        Ok(Bytes::from(output))
    }
}
