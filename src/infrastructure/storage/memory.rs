//! In-memory blob store with fault injection.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::stores::{parse_blob_key, BlobStore};
use crate::shared::error::AppError;

/// Blob store backed by a `DashMap`.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_uploads: AtomicBool,
    delete_calls: Mutex<Vec<String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delete of `key` fail until cleared.
    pub fn fail_delete_for(&self, key: &str) {
        self.failing_deletes.lock().insert(parse_blob_key(key));
    }

    pub fn clear_faults(&self) {
        self.failing_deletes.lock().clear();
        self.fail_uploads.store(false, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Keys passed to `delete`, in call order, failures included.
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().clone()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs.contains_key(&parse_blob_key(key))
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, bytes: Bytes, key: &str) -> Result<String, AppError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(AppError::BlobStore("injected upload failure".into()));
        }
        let key = parse_blob_key(key);
        self.blobs.insert(key.clone(), bytes);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let key = parse_blob_key(key);
        self.delete_calls.lock().push(key.clone());
        if self.failing_deletes.lock().contains(&key) {
            return Err(AppError::BlobStore(format!("injected delete failure for {}", key)));
        }
        self.blobs.remove(&key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.contains(key))
    }

    fn parse_key(&self, src: &str) -> String {
        parse_blob_key(src)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
