//! HTTP API
//!
//! Routes, handlers and extractors of the REST surface.

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
