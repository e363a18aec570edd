//! Delivering converted outputs to the user

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use convertr_core::models::DownloadHandle;
use std::path::{Path, PathBuf};

use crate::api::ApiClient;
use crate::blob::BlobStore;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the output behind `handle` and hand it to the user.
    /// Returns where the output ended up.
    async fn download(&self, handle: &DownloadHandle) -> anyhow::Result<PathBuf>;
}

/// Writes outputs into a directory, never overwriting an existing file
pub struct DirectoryDownloader {
    dir: PathBuf,
    blobs: BlobStore,
    api: Option<ApiClient>,
}

impl DirectoryDownloader {
    pub fn new(dir: impl Into<PathBuf>, blobs: BlobStore) -> Self {
        Self {
            dir: dir.into(),
            blobs,
            api: None,
        }
    }

    /// Needed for handles that point at the server
    pub fn with_api(mut self, api: ApiClient) -> Self {
        self.api = Some(api);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn fetch(&self, location: &str) -> anyhow::Result<Bytes> {
        if BlobStore::is_blob_location(location) {
            let blob = self
                .blobs
                .get(location)
                .with_context(|| format!("Output {} is no longer available", location))?;
            return Ok(blob.data);
        }

        let api = self
            .api
            .as_ref()
            .with_context(|| format!("No server configured to fetch {}", location))?;
        Ok(api.download(location).await?)
    }
}

/// Base name only, so a handle cannot write outside the target directory
fn safe_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "download".to_string()
    } else {
        base.to_string()
    }
}

/// `name.ext`, then `name (1).ext`, `name (2).ext`...
fn candidate_name(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

async fn free_path(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let mut n = 0;
    loop {
        let path = dir.join(candidate_name(name, n));
        if !tokio::fs::try_exists(&path).await? {
            return Ok(path);
        }
        n += 1;
    }
}

#[async_trait]
impl Downloader for DirectoryDownloader {
    #[tracing::instrument(skip(self, handle), fields(file_name = %handle.file_name))]
    async fn download(&self, handle: &DownloadHandle) -> anyhow::Result<PathBuf> {
        let data = self.fetch(&handle.location).await?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = free_path(&self.dir, &safe_file_name(&handle.file_name)).await?;
        tokio::fs::write(&path, &data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), size = data.len(), "Download saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;

    fn store_blob(blobs: &BlobStore, name: &str, data: &'static [u8]) -> DownloadHandle {
        let location = blobs.insert(Blob {
            file_name: name.to_string(),
            content_type: "text/plain",
            data: Bytes::from_static(data),
        });
        DownloadHandle {
            location,
            file_name: name.to_string(),
        }
    }

    #[test]
    fn test_candidate_names() {
        assert_eq!(candidate_name("a.zip", 0), "a.zip");
        assert_eq!(candidate_name("a.tar.gz", 2), "a.tar (2).gz");
        assert_eq!(candidate_name("README", 1), "README (1)");
    }

    #[test]
    fn test_safe_file_name_strips_directories() {
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("..\\x.txt"), "x.txt");
        assert_eq!(safe_file_name(".."), "download");
    }

    #[tokio::test]
    async fn test_writes_blob_and_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new();
        let downloader = DirectoryDownloader::new(dir.path(), blobs.clone());

        let first = store_blob(&blobs, "out.txt", b"one");
        let second = store_blob(&blobs, "out.txt", b"two");

        let a = downloader.download(&first).await.unwrap();
        let b = downloader.download(&second).await.unwrap();

        assert_eq!(a, dir.path().join("out.txt"));
        assert_eq!(b, dir.path().join("out (1).txt"));
        assert_eq!(std::fs::read(&a).unwrap(), b"one");
        assert_eq!(std::fs::read(&b).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_missing_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = DirectoryDownloader::new(dir.path(), BlobStore::new());
        let handle = DownloadHandle {
            location: format!("blob:{}", uuid::Uuid::new_v4()),
            file_name: "gone.txt".to_string(),
        };
        assert!(downloader.download(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_http_location_without_api_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = DirectoryDownloader::new(dir.path(), BlobStore::new());
        let handle = DownloadHandle {
            location: "/api/download/1".to_string(),
            file_name: "a.zip".to_string(),
        };
        let err = downloader.download(&handle).await.unwrap_err();
        assert!(err.to_string().contains("No server configured"));
    }
}
