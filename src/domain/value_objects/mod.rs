//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **QuotaLimit / QuotaViolation**: Bounded room resources and rejected writes
//! - **ResourceClass**: Which resource family a retention sweep expires
//! - **Topic / LifecycleEvent**: Notification routing and payloads

mod quota;
mod resource_class;
mod topic;

pub use quota::*;
pub use resource_class::*;
pub use topic::*;
