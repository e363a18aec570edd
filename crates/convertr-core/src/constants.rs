//! Shared constants

/// Path prefix under which every server endpoint is mounted
pub const API_PREFIX: &str = "/api";

/// Multipart field names accepted by the upload endpoint
pub const UPLOAD_FIELD_NAMES: &[&str] = &["file", "files"];

/// Scheme prefix of download locations that live in the client's local blob store
pub const BLOB_SCHEME: &str = "blob:";

/// Upper bound on files in one multipart upload, used to size the body limit
pub const MAX_FILES_PER_REQUEST: u64 = 20;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
