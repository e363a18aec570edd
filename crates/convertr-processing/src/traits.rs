//! Converter interface
//!
//! Every converter family implements [`Converter`]. The manager asks each
//! registered converter whether it handles a (source, target) pair and hands
//! the job to the first one that does.

use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::{ConversionOptions, FormatTag};

use crate::error::ConversionError;

/// Everything a converter needs for one conversion
#[derive(Debug, Clone)]
pub struct ConversionInput {
    pub data: Bytes,
    pub file_name: String,
    pub source: FormatTag,
    pub target: FormatTag,
    pub options: ConversionOptions,
}

#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;

    fn handles(&self, source: &FormatTag, target: &FormatTag) -> bool;

    async fn convert(&self, input: ConversionInput) -> Result<Bytes, ConversionError>;
}
