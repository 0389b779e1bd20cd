//! Webhook reconciler - maps verified provider events onto
//! entitlement state, exactly once.
//!
//! ## Design
//!
//! Processing order per event:
//! 1. Ledger gate: already-recorded events are acknowledged as no-ops
//! 2. Dispatch on event kind, mutating state through converging
//!    writes (upserts and insert-if-absent)
//! 3. Record the event in the ledger, insert-if-absent
//!
//! The mutation happens before the ledger write. That order is safe
//! because every mutation converges under replay; the ledger exists
//! to short-circuit redeliveries, not to guard correctness.
//!
//! ## Race Condition Handling
//!
//! Concurrent deliveries of the same event both mutate (harmlessly)
//! and then race on the ledger insert. The loser observes
//! `AlreadyExists` and reports the event as already processed.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::domain::entitlement::entitlement::{Entitlement, PlusStatus};
use crate::domain::entitlement::errors::WebhookError;
use crate::domain::entitlement::provider_event::{
    CheckoutSessionObject, EventKind, InvoiceObject, ProviderEvent, SubscriptionObject,
};
use crate::domain::entitlement::unlock::{MomentLevel, Unlock, UnlockKey};
use crate::domain::foundation::UserId;
use crate::ports::event_ledger::{EventLedger, ProcessedEvent, SaveResult};
use crate::ports::{EntitlementStore, PaymentProvider, PurchaseLog, PurchaseRecord};

/// Outcome of reconciling one webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event mutated entitlement state.
    Applied,
    /// Event was acknowledged without a state change.
    Ignored(String),
    /// Event had already been processed.
    AlreadyProcessed,
}

/// Reconciles provider webhook events against the entitlement store.
pub struct WebhookReconciler {
    store: Arc<dyn EntitlementStore>,
    ledger: Arc<dyn EventLedger>,
    provider: Arc<dyn PaymentProvider>,
    purchases: Arc<dyn PurchaseLog>,
    require_livemode: bool,
}

impl WebhookReconciler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        ledger: Arc<dyn EventLedger>,
        provider: Arc<dyn PaymentProvider>,
        purchases: Arc<dyn PurchaseLog>,
        require_livemode: bool,
    ) -> Self {
        Self {
            store,
            ledger,
            provider,
            purchases,
            require_livemode,
        }
    }

    /// Processes one verified event exactly once.
    pub async fn process(&self, event: ProviderEvent) -> Result<ReconcileOutcome, WebhookError> {
        if self.require_livemode && !event.is_live() {
            warn!(event_id = %event.id, "rejecting test mode event in live environment");
            return Err(WebhookError::TestModeRejected);
        }

        if self.ledger.find(&event.id).await?.is_some() {
            debug!(event_id = %event.id, "event already in ledger, skipping");
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let dispatched = self.dispatch(&event).await;

        let (record, outcome) = match dispatched {
            Ok(()) => (
                ProcessedEvent::applied(&event.id, &event.event_type),
                ReconcileOutcome::Applied,
            ),
            Err(WebhookError::Anomaly(reason)) => (
                ProcessedEvent::ignored(&event.id, &event.event_type, &reason),
                ReconcileOutcome::Ignored(reason),
            ),
            // No ledger row: the provider will redeliver
            Err(e) => return Err(e),
        };

        match self.ledger.record(record).await? {
            SaveResult::Inserted => Ok(outcome),
            SaveResult::AlreadyExists => Ok(ReconcileOutcome::AlreadyProcessed),
        }
    }

    async fn dispatch(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        match event.kind() {
            EventKind::CheckoutSessionCompleted => self.handle_checkout_completed(event).await,
            EventKind::InvoicePaid => self.handle_invoice_paid(event).await,
            EventKind::SubscriptionUpdated => self.handle_subscription_updated(event).await,
            EventKind::SubscriptionDeleted => self.handle_subscription_deleted(event).await,
            EventKind::Unknown => {
                debug!(event_id = %event.id, event_type = %event.event_type, "unhandled event type");
                Err(WebhookError::Anomaly(format!(
                    "unhandled event type: {}",
                    event.event_type
                )))
            }
        }
    }

    async fn handle_checkout_completed(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(user_id) = session.metadata_value("user_id") else {
            warn!(
                event_id = %event.id,
                session_id = %session.id,
                "checkout session completed without user_id metadata"
            );
            return Err(WebhookError::Anomaly(
                "checkout session missing user_id metadata".to_string(),
            ));
        };
        let user_id = UserId::new(user_id)
            .map_err(|e| WebhookError::Anomaly(format!("invalid user_id metadata: {e}")))?;

        match session.metadata_value("purchase_type") {
            Some("moment") => {
                let key = UnlockKey::moment(
                    session
                        .metadata_value("character_id")
                        .ok_or(WebhookError::MissingMetadata("character_id"))?,
                    session
                        .metadata_value("situation_id")
                        .ok_or(WebhookError::MissingMetadata("situation_id"))?,
                    MomentLevel::parse(
                        session
                            .metadata_value("moment_level")
                            .ok_or(WebhookError::MissingMetadata("moment_level"))?,
                    )
                    .map_err(|e| WebhookError::ParseError(e.to_string()))?,
                )
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
                self.grant_unlock(&user_id, key, &event.id, &session, "moment")
                    .await
            }
            Some("media") => {
                let key = UnlockKey::media(
                    session
                        .metadata_value("character_id")
                        .ok_or(WebhookError::MissingMetadata("character_id"))?,
                    session
                        .metadata_value("media_id")
                        .ok_or(WebhookError::MissingMetadata("media_id"))?,
                )
                .map_err(|e| WebhookError::ParseError(e.to_string()))?;
                self.grant_unlock(&user_id, key, &event.id, &session, "media")
                    .await
            }
            Some("plus") => self.activate_plus(&user_id, &event.id, &session).await,
            other => {
                warn!(
                    event_id = %event.id,
                    purchase_type = ?other,
                    "checkout session with unrecognized purchase_type"
                );
                Err(WebhookError::Anomaly(format!(
                    "unrecognized purchase_type: {other:?}"
                )))
            }
        }
    }

    async fn grant_unlock(
        &self,
        user_id: &UserId,
        key: UnlockKey,
        event_id: &str,
        session: &CheckoutSessionObject,
        purchase_type: &str,
    ) -> Result<(), WebhookError> {
        let unlock = Unlock::grant(user_id.clone(), key, &session.id);
        let result = self.store.insert_unlock(&unlock).await?;
        if result == SaveResult::AlreadyExists {
            debug!(user_id = %user_id, session_id = %session.id, "unlock already granted");
        }

        self.purchases
            .append(PurchaseRecord::from_checkout(
                user_id.clone(),
                event_id,
                session,
                purchase_type,
            ))
            .await?;
        Ok(())
    }

    async fn activate_plus(
        &self,
        user_id: &UserId,
        event_id: &str,
        session: &CheckoutSessionObject,
    ) -> Result<(), WebhookError> {
        let subscription_id = session
            .subscription
            .as_deref()
            .ok_or(WebhookError::MissingField("subscription"))?;

        let period_end = self.fetch_period_end(subscription_id).await;

        let mut entitlement = match self.store.find_by_user(user_id).await? {
            Some(e) => e,
            None => Entitlement::new(user_id.clone()),
        };
        if entitlement.provider_customer_id.is_none() {
            entitlement.provider_customer_id = session.customer.clone();
        }
        entitlement.apply_subscription_started(subscription_id, period_end);
        self.store.upsert(&entitlement).await?;

        self.purchases
            .append(PurchaseRecord::from_checkout(
                user_id.clone(),
                event_id,
                session,
                "plus",
            ))
            .await?;
        Ok(())
    }

    async fn handle_invoice_paid(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let invoice: InvoiceObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(customer_id) = invoice.customer.as_deref() else {
            return Err(WebhookError::Anomaly(
                "invoice.paid without a customer".to_string(),
            ));
        };

        let Some(mut entitlement) = self.store.find_by_customer(customer_id).await? else {
            warn!(
                event_id = %event.id,
                customer_id = %customer_id,
                "invoice.paid for unknown customer"
            );
            return Err(WebhookError::Anomaly(format!(
                "unknown customer: {customer_id}"
            )));
        };

        let period_end = match invoice
            .subscription
            .as_deref()
            .or(entitlement.provider_subscription_id.as_deref())
        {
            Some(subscription_id) => self.fetch_period_end(subscription_id).await,
            None => None,
        };

        entitlement.apply_renewal(period_end);
        self.store.upsert(&entitlement).await?;
        Ok(())
    }

    async fn handle_subscription_updated(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(mut entitlement) = self.store.find_by_customer(&subscription.customer).await?
        else {
            warn!(
                event_id = %event.id,
                customer_id = %subscription.customer,
                "subscription update for unknown customer"
            );
            return Err(WebhookError::Anomaly(format!(
                "unknown customer: {}",
                subscription.customer
            )));
        };

        let status = PlusStatus::from_provider(&subscription.status);
        let period_end = subscription.current_period_end.and_then(unix_timestamp);
        entitlement.provider_subscription_id = Some(subscription.id.clone());
        entitlement.apply_status_change(status, period_end);
        self.store.upsert(&entitlement).await?;
        Ok(())
    }

    async fn handle_subscription_deleted(&self, event: &ProviderEvent) -> Result<(), WebhookError> {
        let subscription: SubscriptionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(e.to_string()))?;

        let Some(mut entitlement) = self.store.find_by_customer(&subscription.customer).await?
        else {
            warn!(
                event_id = %event.id,
                customer_id = %subscription.customer,
                "subscription deletion for unknown customer"
            );
            return Err(WebhookError::Anomaly(format!(
                "unknown customer: {}",
                subscription.customer
            )));
        };

        entitlement.apply_subscription_deleted();
        self.store.upsert(&entitlement).await?;
        Ok(())
    }

    /// Resolves the billing period end from the provider.
    ///
    /// A lookup failure degrades to `None` rather than failing the
    /// event: the period end is advisory and the next renewal event
    /// corrects it.
    async fn fetch_period_end(&self, subscription_id: &str) -> Option<DateTime<Utc>> {
        match self.provider.get_subscription(subscription_id).await {
            Ok(Some(subscription)) => subscription.current_period_end.and_then(unix_timestamp),
            Ok(None) => {
                warn!(subscription_id = %subscription_id, "subscription not found at provider");
                None
            }
            Err(e) => {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "failed to fetch subscription for period end"
                );
                None
            }
        }
    }
}

fn unix_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
