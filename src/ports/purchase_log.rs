//! PurchaseLog port - append-only audit of completed purchases.
//!
//! One row per completed checkout. Never consulted for access
//! decisions; supports the post-redirect session check and support
//! tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::entitlement::CheckoutSessionObject;
use crate::domain::foundation::{DomainError, UserId};

/// Audit record for a completed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseRecord {
    pub id: Uuid,
    pub user_id: UserId,
    /// Provider checkout session id (cs_xxx).
    pub checkout_session_id: String,
    /// Catalog entry name, e.g. "moment_exclusive" or "plus".
    pub purchase_type: String,
    /// Webhook event that produced this row (evt_xxx).
    pub provider_event_id: String,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    /// Amount in the currency's minor unit.
    pub amount: Option<i64>,
    pub currency: Option<String>,
    /// Provider payment status at completion time.
    pub status: String,
    /// Raw checkout metadata, including the content discriminators.
    pub metadata: HashMap<String, String>,
    pub completed_at: DateTime<Utc>,
}

impl PurchaseRecord {
    pub fn new(
        user_id: UserId,
        checkout_session_id: impl Into<String>,
        purchase_type: impl Into<String>,
        provider_event_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            checkout_session_id: checkout_session_id.into(),
            purchase_type: purchase_type.into(),
            provider_event_id: provider_event_id.into(),
            payment_intent_id: None,
            subscription_id: None,
            amount: None,
            currency: None,
            status: "paid".to_string(),
            metadata: HashMap::new(),
            completed_at: Utc::now(),
        }
    }

    /// Builds an audit row from a completed checkout session payload.
    pub fn from_checkout(
        user_id: UserId,
        provider_event_id: &str,
        session: &CheckoutSessionObject,
        purchase_type: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            checkout_session_id: session.id.clone(),
            purchase_type: purchase_type.to_string(),
            provider_event_id: provider_event_id.to_string(),
            payment_intent_id: session.payment_intent.clone(),
            subscription_id: session.subscription.clone(),
            amount: session.amount_total,
            currency: session.currency.clone(),
            status: session
                .payment_status
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            metadata: session.metadata.clone(),
            completed_at: Utc::now(),
        }
    }
}

/// Port for the purchase audit log.
#[async_trait]
pub trait PurchaseLog: Send + Sync {
    /// Appends an audit row. Duplicate session ids are absorbed.
    async fn append(&self, record: PurchaseRecord) -> Result<(), DomainError>;

    /// Looks up a purchase by its checkout session id.
    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<PurchaseRecord>, DomainError>;
}
