//! In-process store for outputs produced without a server
//!
//! Entries are addressed by `blob:{uuid}` locations, which end up in
//! [`DownloadHandle::location`](convertr_core::models::DownloadHandle).

use bytes::Bytes;
use convertr_core::constants::BLOB_SCHEME;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Blob {
    pub file_name: String,
    pub content_type: &'static str,
    pub data: Bytes,
}

#[derive(Clone, Default)]
pub struct BlobStore {
    blobs: Arc<RwLock<HashMap<Uuid, Blob>>>,
}

fn parse_location(location: &str) -> Option<Uuid> {
    location
        .strip_prefix(BLOB_SCHEME)
        .and_then(|id| Uuid::parse_str(id).ok())
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `blob` and return its location
    pub fn insert(&self, blob: Blob) -> String {
        let id = Uuid::new_v4();
        self.blobs.write().insert(id, blob);
        format!("{}{}", BLOB_SCHEME, id)
    }

    pub fn get(&self, location: &str) -> Option<Blob> {
        let id = parse_location(location)?;
        self.blobs.read().get(&id).cloned()
    }

    pub fn remove(&self, location: &str) -> Option<Blob> {
        let id = parse_location(location)?;
        self.blobs.write().remove(&id)
    }

    pub fn clear(&self) {
        self.blobs.write().clear();
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn is_blob_location(location: &str) -> bool {
        location.starts_with(BLOB_SCHEME)
    }
}
