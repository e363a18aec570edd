use convertr_core::models::FormatTag;
use convertr_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Converting {source_format} to {target_format} is not supported")]
    Unsupported {
        source_format: FormatTag,
        target_format: FormatTag,
    },

    #[error("No converter is available for {source_format} to {target_format}")]
    NotImplemented {
        source_format: FormatTag,
        target_format: FormatTag,
    },

    #[error("Failed to decode input: {0}")]
    Decode(String),

    #[error("Failed to encode output: {0}")]
    Encode(String),

    #[error("External tool failed: {0}")]
    Tool(String),

    #[error("Converter crashed: {0}")]
    Crashed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    pub fn not_implemented(source: &FormatTag, target: &FormatTag) -> Self {
        ConversionError::NotImplemented {
            source_format: source.clone(),
            target_format: target.clone(),
        }
    }
}

impl From<tokio::task::JoinError> for ConversionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ConversionError::Crashed(err.to_string())
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Unsupported { .. } => AppError::UnsupportedFormat(err.to_string()),
            ConversionError::Io(e) => AppError::Internal(format!("IO error during conversion: {}", e)),
            other => AppError::Conversion(other.to_string()),
        }
    }
}
