//! Post-commit blob purging.
//!
//! Blobs are only deleted after the metadata transaction that released them
//! has committed. A failed delete leaves an orphan blob behind: it is logged
//! and counted, never turned back into a metadata error.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::domain::stores::BlobStore;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// A blob whose delete failed after its metadata was removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanBlob {
    pub key: String,
    pub error: String,
}

/// Outcome of purging a set of blob keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeOutcome {
    pub attempted: u64,
    pub deleted: u64,
    pub orphans: Vec<OrphanBlob>,
}

/// Delete `keys` with at most `concurrency` requests in flight.
///
/// `source` labels the orphan metric ("files", "messages" or "manual").
pub async fn purge_blobs(
    blobs: &dyn BlobStore,
    keys: Vec<String>,
    concurrency: usize,
    timeout: Duration,
    source: &str,
) -> PurgeOutcome {
    let mut outcome = PurgeOutcome {
        attempted: keys.len() as u64,
        ..Default::default()
    };
    if keys.is_empty() {
        return outcome;
    }

    let results: Vec<(String, Result<(), AppError>)> = stream::iter(keys)
        .map(|key| async move {
            let normalized = blobs.parse_key(&key);
            let result = match tokio::time::timeout(timeout, blobs.delete(&normalized)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::timeout("blob delete")),
            };
            (normalized, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (key, result) in results {
        match result {
            Ok(()) => outcome.deleted += 1,
            Err(e) => {
                tracing::warn!(
                    blob_key = %key,
                    backend = blobs.backend_name(),
                    source = source,
                    error = %e,
                    "Orphan blob: metadata removed but blob delete failed"
                );
                metrics::record_orphan_blob(source);
                outcome.orphans.push(OrphanBlob {
                    key,
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}
