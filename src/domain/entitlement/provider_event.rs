//! Payment provider webhook event types.
//!
//! Structures for parsing Stripe webhook payloads. Only the fields
//! the reconciler acts on are captured; everything else in the
//! provider's event schema is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A webhook event as delivered by the payment provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique event identifier (evt_xxx). Idempotency key.
    pub id: String,

    /// Event kind string, e.g. "checkout.session.completed".
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation.
    pub created: i64,

    /// Event-specific payload.
    pub data: ProviderEventData,

    /// Whether the event originated in live mode.
    #[serde(default)]
    pub livemode: bool,
}

/// Container for the polymorphic event payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    pub object: serde_json::Value,
}

impl ProviderEvent {
    pub fn is_live(&self) -> bool {
        self.livemode
    }

    /// Deserializes the payload object as the given type.
    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_str(&self.event_type)
    }
}

/// Event kinds the reconciler recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CheckoutSessionCompleted,
    InvoicePaid,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unknown,
}

impl EventKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.paid" => Self::InvoicePaid,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaid => "invoice.paid",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::Unknown => "unknown",
        }
    }
}

/// Checkout session payload for `checkout.session.completed`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionObject {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Subscription payload for `customer.subscription.*` events.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Invoice payload for `invoice.paid`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

/// Builder for test events.
#[cfg(test)]
pub struct ProviderEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
    livemode: bool,
}

#[cfg(test)]
impl Default for ProviderEventBuilder {
    fn default() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
            livemode: false,
        }
    }
}

#[cfg(test)]
impl ProviderEventBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn livemode(mut self, livemode: bool) -> Self {
        self.livemode = livemode;
        self
    }

    pub fn build(self) -> ProviderEvent {
        ProviderEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: ProviderEventData {
                object: self.object,
            },
            livemode: self.livemode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ══════════════════════════════════════════════════════════════
    // Deserialization Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deserialize_minimal_event() {
        let json = r#"{
            "id": "evt_1234567890",
            "type": "checkout.session.completed",
            "created": 1704067200,
            "data": { "object": {} },
            "livemode": false
        }"#;

        let event: ProviderEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.id, "evt_1234567890");
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.created, 1704067200);
        assert!(!event.livemode);
    }

    #[test]
    fn livemode_defaults_to_false_when_absent() {
        let json = r#"{
            "id": "evt_no_livemode",
            "type": "invoice.paid",
            "created": 1704067200,
            "data": { "object": {} }
        }"#;

        let event: ProviderEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_live());
    }

    #[test]
    fn deserialize_checkout_session_object() {
        let event = ProviderEventBuilder::new()
            .object(json!({
                "id": "cs_test_abc",
                "customer": "cus_xyz",
                "subscription": "sub_123",
                "mode": "subscription",
                "metadata": {
                    "user_id": "user-1",
                    "purchase_type": "plus"
                }
            }))
            .build();

        let session: CheckoutSessionObject = event.deserialize_object().unwrap();
        assert_eq!(session.id, "cs_test_abc");
        assert_eq!(session.customer.as_deref(), Some("cus_xyz"));
        assert_eq!(session.metadata_value("user_id"), Some("user-1"));
        assert_eq!(session.metadata_value("purchase_type"), Some("plus"));
    }

    #[test]
    fn empty_metadata_value_reads_as_absent() {
        let event = ProviderEventBuilder::new()
            .object(json!({
                "id": "cs_test_abc",
                "metadata": { "user_id": "" }
            }))
            .build();

        let session: CheckoutSessionObject = event.deserialize_object().unwrap();
        assert_eq!(session.metadata_value("user_id"), None);
    }

    #[test]
    fn deserialize_subscription_object() {
        let event = ProviderEventBuilder::new()
            .event_type("customer.subscription.updated")
            .object(json!({
                "id": "sub_123",
                "customer": "cus_xyz",
                "status": "past_due",
                "current_period_end": 1706745600
            }))
            .build();

        let sub: SubscriptionObject = event.deserialize_object().unwrap();
        assert_eq!(sub.status, "past_due");
        assert_eq!(sub.current_period_end, Some(1706745600));
    }

    #[test]
    fn deserialize_object_fails_for_wrong_shape() {
        let event = ProviderEventBuilder::new()
            .object(json!({ "id": "in_123" }))
            .build();

        // SubscriptionObject needs customer and status
        let result: Result<SubscriptionObject, _> = event.deserialize_object();
        assert!(result.is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // EventKind Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn recognized_kinds_round_trip() {
        let kinds = [
            EventKind::CheckoutSessionCompleted,
            EventKind::InvoicePaid,
            EventKind::SubscriptionUpdated,
            EventKind::SubscriptionDeleted,
        ];
        for kind in kinds {
            assert_eq!(EventKind::from_str(kind.as_str()), kind);
        }
    }

    #[test]
    fn unrecognized_kind_maps_to_unknown() {
        assert_eq!(
            EventKind::from_str("payment_intent.succeeded"),
            EventKind::Unknown
        );
        assert_eq!(EventKind::from_str(""), EventKind::Unknown);
    }

    #[test]
    fn kind_accessor_parses_event_type() {
        let event = ProviderEventBuilder::new()
            .event_type("customer.subscription.deleted")
            .build();
        assert_eq!(event.kind(), EventKind::SubscriptionDeleted);
    }
}
