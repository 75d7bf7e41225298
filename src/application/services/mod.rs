//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **QuotaEvaluator**: Room usage and quota verdicts
//! - **ResourceWriteGuard**: Quota-bound writes (channels, members, files, messages)
//! - **RoomService**: Room lifecycle, usage and manual deletes
//! - **blob_cleanup**: Post-commit blob purging

pub mod blob_cleanup;
pub mod quota_service;
pub mod room_service;
pub mod write_guard;

pub use blob_cleanup::{purge_blobs, OrphanBlob, PurgeOutcome};
pub use quota_service::QuotaEvaluator;
pub use room_service::{RoomDeletion, RoomService, RoomUsageReport};
pub use write_guard::{FileUpload, PostedMessage, ResourceWriteGuard, RoomGuard, RoomLocks};
