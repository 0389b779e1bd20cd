//! EntitlementStore port - persistence for entitlements and unlocks.
//!
//! All writes are converging: entitlement rows are upserted keyed by
//! user, customer ids are claimed first-write-wins, and unlocks are
//! insert-if-absent. Replaying any webhook therefore leaves the same
//! state behind.

use async_trait::async_trait;

use crate::domain::entitlement::{Entitlement, Unlock, UnlockKey};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::event_ledger::SaveResult;

/// Port for entitlement and unlock persistence.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Loads a user's entitlement row, if one exists.
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Entitlement>, DomainError>;

    /// Resolves the user owning a provider customer id.
    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<Entitlement>, DomainError>;

    /// Writes an entitlement row keyed by user id, inserting or
    /// replacing the mutable fields.
    async fn upsert(&self, entitlement: &Entitlement) -> Result<(), DomainError>;

    /// Claims a provider customer id for a user, first write wins.
    ///
    /// Returns the winning entitlement row. When a concurrent caller
    /// already attached a customer id, that id is returned and the
    /// proposed one is discarded.
    async fn ensure_customer(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> Result<Entitlement, DomainError>;

    /// Inserts an unlock if the user does not already own it.
    async fn insert_unlock(&self, unlock: &Unlock) -> Result<SaveResult, DomainError>;

    /// Checks ownership of a single unlock.
    async fn find_unlock(
        &self,
        user_id: &UserId,
        key: &UnlockKey,
    ) -> Result<Option<Unlock>, DomainError>;

    /// Lists everything the user has unlocked.
    async fn list_unlocks(&self, user_id: &UserId) -> Result<Vec<Unlock>, DomainError>;
}
