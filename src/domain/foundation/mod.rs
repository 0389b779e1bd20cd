//! Foundation domain module.
//!
//! Shared value objects and error types used across the domain.

mod errors;
mod ids;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::UserId;
