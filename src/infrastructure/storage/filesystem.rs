//! Filesystem blob store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, instrument, warn};

use crate::domain::stores::{parse_blob_key, BlobStore};
use crate::shared::error::AppError;

/// Stores blobs as `{root}/{key}`.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create the store, creating `root` if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        if !root.exists() {
            info!(path = %root.display(), "Creating blob storage directory");
            std::fs::create_dir_all(&root).map_err(io_error)?;
        }
        Ok(Self { root })
    }

    /// Resolve a key to a path under the root, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let key = parse_blob_key(key);
        let relative = Path::new(&key);
        if key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::BadRequest(format!("Invalid blob key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error) -> AppError {
    AppError::BlobStore(e.to_string())
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, bytes: Bytes, key: &str) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        // Write to a temp file first, then rename for atomicity
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        tokio::fs::write(&temp_path, &bytes).await.map_err(io_error)?;
        tokio::fs::rename(&temp_path, &path).await.map_err(io_error)?;

        debug!(key, path = %path.display(), "Blob stored");
        Ok(parse_blob_key(key))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Blob not found during deletion");
                Ok(())
            }
            Err(e) => Err(io_error(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    fn parse_key(&self, src: &str) -> String {
        parse_blob_key(src)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
