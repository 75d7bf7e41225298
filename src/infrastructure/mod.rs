//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL) and an in-memory metadata store
//! - Blob storage backends
//! - Notification fan-out (Redis PUBLISH)
//! - Prometheus metrics

pub mod database;
pub mod memory;
pub mod metrics;
pub mod notify;
pub mod repositories;
pub mod storage;
