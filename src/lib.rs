//! # Roomkeeper
//!
//! Room resource lifecycle management for a chat service:
//! - Quota-guarded writes (storage bytes, channel slots, member slots)
//! - Scheduled retention sweeps that expire files and messages
//! - Lifecycle notifications over a WebSocket gateway and Redis
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, repository traits, quota policy
//! - **Application Layer**: Quota evaluator, write guard, room service
//! - **Retention**: Cron schedule, sweeper state machine, workers
//! - **Infrastructure Layer**: PostgreSQL, blob stores, Redis, metrics
//! - **Presentation Layer**: HTTP handlers and WebSocket gateway
//!
//! ## Module Structure
//!
//! ```text
//! roomkeeper/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects, store traits
//! +-- application/    Services and DTOs
//! +-- retention/      Retention sweeper and scheduled workers
//! +-- infrastructure/ Database, storage, notification, metrics
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Errors, snowflake IDs, clock
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Retention sweeps
pub mod retention;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
