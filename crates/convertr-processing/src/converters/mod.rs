//! Converter implementations, one per family, each behind its own feature

#[cfg(feature = "archive")]
pub mod archive;
#[cfg(feature = "document")]
pub mod document;
#[cfg(feature = "media")]
pub mod ffmpeg;
#[cfg(feature = "image")]
pub mod image;
#[cfg(feature = "office")]
pub mod office;
#[cfg(any(feature = "image", feature = "document"))]
mod pdf;

#[cfg(feature = "archive")]
pub use archive::ArchiveConverter;
#[cfg(feature = "document")]
pub use document::DocumentConverter;
#[cfg(feature = "media")]
pub use ffmpeg::FfmpegConverter;
#[cfg(feature = "image")]
pub use self::image::ImageConverter;
#[cfg(feature = "office")]
pub use office::OfficeConverter;
