//! # Domain Layer
//!
//! The domain layer contains the core rules of room resource management.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Rooms, channels, members, messages, files, webhooks
//! - **value_objects**: Quota limits, resource classes, notification topics
//! - **services**: Pure quota policy
//! - **stores**: Retention, blob and notification collaborator traits
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Usage counters are derived by query, never stored
//! - Repository traits define data access contracts

pub mod entities;
pub mod services;
pub mod stores;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use stores::*;
pub use value_objects::*;
