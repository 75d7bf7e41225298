//! Domain Services
//!
//! Stateless business rules that do not belong to a single entity.

mod quota_policy;

pub use quota_policy::QuotaPolicy;
