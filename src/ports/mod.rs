//! Ports layer.
//!
//! Trait contracts between the domain and the outside world. Adapters
//! implement these; application handlers depend on them as trait
//! objects.

pub mod entitlement_store;
pub mod event_ledger;
pub mod payment_provider;
pub mod purchase_log;

pub use entitlement_store::EntitlementStore;
pub use event_ledger::{EventLedger, LedgerOutcome, ProcessedEvent, SaveResult};
pub use payment_provider::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, ProviderSubscription, SessionStatus,
};
pub use purchase_log::{PurchaseLog, PurchaseRecord};
