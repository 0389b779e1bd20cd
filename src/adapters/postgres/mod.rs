//! PostgreSQL persistence adapters.

mod entitlement_store;
mod event_ledger;
mod purchase_log;

pub use entitlement_store::PostgresEntitlementStore;
pub use event_ledger::PostgresEventLedger;
pub use purchase_log::PostgresPurchaseLog;
