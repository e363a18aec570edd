//! Convertr Processing Library
//!
//! Upload intake validation, the conversion manager that routes a
//! (source, target) pair to a converter, the individual converters and the
//! result cache.

pub mod cache;
pub mod converters;
pub mod error;
pub mod info;
pub mod manager;
pub mod mime;
pub mod traits;
pub mod validator;

pub use cache::{CacheStats, ConversionCache};
pub use error::ConversionError;
pub use info::inspect;
pub use manager::ConversionManager;
pub use traits::{ConversionInput, Converter};
pub use validator::{AcceptedFile, IntakeReport, IntakeValidator, RawFile, RejectedFile, ValidationError};
