//! Domain layer.
//!
//! Pure business logic with no infrastructure dependencies. The
//! entitlement module owns the payment reconciliation rules while
//! foundation holds shared value objects and error types.

pub mod entitlement;
pub mod foundation;
