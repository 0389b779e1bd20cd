//! Application layer.
//!
//! Command and query handlers wiring domain logic to the ports.

pub mod checkout;
pub mod checkout_lease;
pub mod queries;
pub mod webhook;

pub use checkout::{StartCheckoutCommand, StartCheckoutHandler};
pub use checkout_lease::CheckoutLease;
pub use queries::{EntitlementQueryService, EntitlementSnapshot, SessionConfirmation};
pub use webhook::HandleWebhookHandler;
