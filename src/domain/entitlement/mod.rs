//! Entitlement domain.
//!
//! Everything payment-derived: unlock grants, the Plus subscription
//! state machine, the purchase catalog, webhook verification, and the
//! reconciler that maps provider events onto entitlement state.

pub mod access;
pub mod catalog;
mod entitlement;
pub mod errors;
pub mod provider_event;
pub mod reconciler;
mod unlock;
pub mod webhook_verifier;

pub use access::{AccessDecision, AccessReason};
pub use catalog::{CatalogEntry, CheckoutMode, CheckoutRequest, PriceBook, PurchaseIntent};
pub use entitlement::{Entitlement, PlusStatus};
pub use errors::{BillingError, WebhookError};
pub use provider_event::{CheckoutSessionObject, EventKind, ProviderEvent};
pub use reconciler::{ReconcileOutcome, WebhookReconciler};
pub use unlock::{MomentLevel, Unlock, UnlockKey};
pub use webhook_verifier::WebhookVerifier;
