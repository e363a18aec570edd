//! Routes a conversion to the first registered converter that handles it

use bytes::Bytes;
use convertr_core::models::{is_conversion_supported, FormatTag};
use std::sync::Arc;

use crate::cache::{CacheStats, ConversionCache};
use crate::error::ConversionError;
use crate::traits::{ConversionInput, Converter};

#[derive(Clone, Default)]
pub struct ConversionManager {
    converters: Vec<Arc<dyn Converter>>,
    cache: Option<ConversionCache>,
}

impl ConversionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager with every converter family compiled into this build
    pub fn with_defaults(ffmpeg_path: &str) -> Self {
        #[allow(unused_mut)]
        let mut manager = Self::new();

        #[cfg(feature = "image")]
        {
            manager = manager.with_converter(crate::converters::ImageConverter::new());
        }
        #[cfg(feature = "media")]
        {
            manager = manager.with_converter(crate::converters::FfmpegConverter::new(ffmpeg_path));
        }
        #[cfg(not(feature = "media"))]
        let _ = ffmpeg_path;
        #[cfg(feature = "document")]
        {
            manager = manager.with_converter(crate::converters::DocumentConverter::new());
        }
        #[cfg(feature = "office")]
        {
            manager = manager.with_converter(crate::converters::OfficeConverter::new());
        }
        #[cfg(feature = "archive")]
        {
            manager = manager.with_converter(crate::converters::ArchiveConverter::new());
        }

        manager
    }

    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converters.push(Arc::new(converter));
        self
    }

    pub fn with_cache(mut self, cache: ConversionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn converter_names(&self) -> Vec<&'static str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    fn converter_for(&self, source: &FormatTag, target: &FormatTag) -> Option<&Arc<dyn Converter>> {
        self.converters.iter().find(|c| c.handles(source, target))
    }

    /// Whether the pair is legal and some registered converter can run it
    pub fn supports(&self, source: &FormatTag, target: &FormatTag) -> bool {
        is_conversion_supported(source, target) && self.converter_for(source, target).is_some()
    }

    pub async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError> {
        if !is_conversion_supported(&input.source, &input.target) {
            return Err(ConversionError::Unsupported {
                source_format: input.source.clone(),
                target_format: input.target.clone(),
            });
        }

        let converter = self
            .converter_for(&input.source, &input.target)
            .ok_or_else(|| ConversionError::not_implemented(&input.source, &input.target))?;

        let cache_key = self.cache.as_ref().map(|_| ConversionCache::key(&input));
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                tracing::debug!(
                    source = %input.source,
                    target = %input.target,
                    "Conversion served from cache"
                );
                return Ok(hit);
            }
        }

        let start = std::time::Instant::now();
        let source = input.source.clone();
        let target = input.target.clone();
        let output = converter.convert(input).await?;

        tracing::info!(
            converter = converter.name(),
            source = %source,
            target = %target,
            output_bytes = output.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Conversion completed"
        );

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, output.clone());
        }

        Ok(output)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(ConversionCache::stats)
    }

    pub fn purge_cache(&self) -> usize {
        self.cache
            .as_ref()
            .map(ConversionCache::purge_expired)
            .unwrap_or(0)
    }
}
