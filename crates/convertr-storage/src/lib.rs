//! Convertr Storage Library
//!
//! This crate provides the storage abstraction used for uploaded sources and
//! converted outputs, and a local filesystem implementation.
//!
//! # Storage key format
//!
//! - **Uploaded sources**: `uploads/{file_id}`
//! - **Converted outputs**: `converted/{job_id}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so every caller agrees on the layout.

pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
