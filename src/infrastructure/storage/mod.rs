//! Blob store backends.
//!
//! - **Filesystem**: blobs under a root directory, written atomically
//! - **Memory**: a map in process memory with fault injection for tests

mod filesystem;
mod memory;

pub use filesystem::FilesystemBlobStore;
pub use memory::InMemoryBlobStore;

use sha2::{Digest, Sha256};

/// Key for a new blob: `rooms/{room_id}/{id}-{first 16 hex chars of sha256}`.
pub fn blob_key(room_id: i64, id: i64, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("rooms/{}/{}-{}", room_id, id, hex)
}
