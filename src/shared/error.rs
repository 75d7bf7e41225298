//! Application Error Types
//!
//! Centralized error handling with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::value_objects::QuotaViolation;
use crate::infrastructure::metrics;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    QuotaExceeded(QuotaViolation),

    /// Connectivity failure or timeout against a store; safe to retry later.
    #[error("Transient store error: {0}")]
    Transient(String),

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl AppError {
    /// Whether the failure is worth retrying on the next attempt or cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Transient(_) | AppError::BlobStore(_) => true,
            AppError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
            AppError::Redis(e) => e.is_io_error() || e.is_timeout(),
            _ => false,
        }
    }

    /// Build a timeout error for the named store operation.
    pub fn timeout(operation: &str) -> Self {
        AppError::Transient(format!("{} timed out", operation))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaBody>,
}

/// Quota details attached to a `QuotaExceeded` response
#[derive(Debug, Serialize)]
pub struct QuotaBody {
    pub limit: &'static str,
    pub allowed: i64,
    pub current: i64,
    pub attempted: i64,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut quota = None;
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, 10001, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, 10002, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, 10005, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, 10007, msg.clone()),
            AppError::QuotaExceeded(violation) => {
                quota = Some(QuotaBody {
                    limit: violation.limit.as_str(),
                    allowed: violation.allowed,
                    current: violation.current,
                    attempted: violation.attempted,
                });
                (StatusCode::BAD_REQUEST, 10008, violation.to_string())
            }
            AppError::Transient(msg) => {
                tracing::warn!("Transient store error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, 10009, "Service temporarily unavailable".into())
            }
            AppError::BlobStore(msg) => {
                tracing::error!("Blob store error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
            AppError::Redis(e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, 10000, "Internal server error".into())
            }
        };

        metrics::record_http_error(code);

        let body = ErrorResponse {
            code,
            message,
            quota,
        };

        (status, Json(body)).into_response()
    }
}
