//! Entitlement query service.
//!
//! Read-side handlers: the entitlement snapshot, single unlock
//! checks, and the post-redirect session confirmation. All access
//! evaluation happens in the pure domain function; this layer only
//! fetches the snapshot.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entitlement::{access, AccessDecision, BillingError, PlusStatus, Unlock, UnlockKey};
use crate::domain::foundation::UserId;
use crate::ports::{EntitlementStore, PaymentProvider, PurchaseLog};

/// Snapshot of a user's entitlements.
#[derive(Debug, Clone, Serialize)]
pub struct EntitlementSnapshot {
    pub has_plus: bool,
    pub plus_status: PlusStatus,
    pub unlocks: Vec<Unlock>,
}

impl EntitlementSnapshot {
    fn empty() -> Self {
        Self {
            has_plus: false,
            plus_status: PlusStatus::None,
            unlocks: Vec::new(),
        }
    }
}

/// Post-redirect session confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfirmation {
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<EntitlementSnapshot>,
}

/// Read-side query service.
pub struct EntitlementQueryService {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    purchases: Arc<dyn PurchaseLog>,
}

impl EntitlementQueryService {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        provider: Arc<dyn PaymentProvider>,
        purchases: Arc<dyn PurchaseLog>,
    ) -> Self {
        Self {
            store,
            provider,
            purchases,
        }
    }

    /// Full entitlement snapshot for a user.
    pub async fn get_entitlements(
        &self,
        user_id: &UserId,
    ) -> Result<EntitlementSnapshot, BillingError> {
        let entitlement = self.store.find_by_user(user_id).await?;
        let unlocks = self.store.list_unlocks(user_id).await?;

        Ok(match entitlement {
            Some(e) => EntitlementSnapshot {
                has_plus: e.has_plus,
                plus_status: e.plus_status,
                unlocks,
            },
            None => EntitlementSnapshot {
                unlocks,
                ..EntitlementSnapshot::empty()
            },
        })
    }

    /// Checks access to one content item.
    pub async fn check_unlock(
        &self,
        user_id: &UserId,
        key: &UnlockKey,
    ) -> Result<AccessDecision, BillingError> {
        let has_plus = self
            .store
            .find_by_user(user_id)
            .await?
            .map(|e| e.has_plus)
            .unwrap_or(false);
        let unlocks = self.store.list_unlocks(user_id).await?;

        Ok(access::evaluate(key, has_plus, &unlocks))
    }

    /// Confirms a checkout session after the success redirect.
    ///
    /// Paid means either the webhook already landed (purchase log has
    /// the session) or the provider reports the session as paid. In
    /// both paths the session must belong to the caller; sessions
    /// created for another user read as not found. The snapshot is
    /// included once payment is confirmed so the client can refresh
    /// without a second round trip.
    pub async fn verify_session(
        &self,
        user_id: &UserId,
        session_id: &str,
    ) -> Result<SessionConfirmation, BillingError> {
        let paid = match self.purchases.find_by_session(session_id).await? {
            Some(record) => {
                if &record.user_id != user_id {
                    return Err(BillingError::NotFound(format!(
                        "checkout session {session_id}"
                    )));
                }
                true
            }
            None => match self.provider.get_checkout_session(session_id).await {
                Ok(Some(status)) => {
                    if status.owner_user_id() != Some(user_id.as_str()) {
                        return Err(BillingError::NotFound(format!(
                            "checkout session {session_id}"
                        )));
                    }
                    status.is_paid()
                }
                Ok(None) => {
                    return Err(BillingError::NotFound(format!(
                        "checkout session {session_id}"
                    )))
                }
                Err(e) => return Err(BillingError::Provider(e.to_string())),
            },
        };

        let entitlements = if paid {
            Some(self.get_entitlements(user_id).await?)
        } else {
            None
        };

        Ok(SessionConfirmation { paid, entitlements })
    }
}
