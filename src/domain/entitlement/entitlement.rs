//! Per-user entitlement record.
//!
//! One row per user capturing the Plus subscription state and the
//! link to the payment provider. The boolean access flag is derived
//! from the subscription status and never set independently.

use crate::domain::foundation::{UserId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Plus subscription status.
///
/// `None` means the user has never had (or no longer has any trace
/// of) a subscription. The remaining states mirror the provider's
/// subscription lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlusStatus {
    None,
    Active,
    PastDue,
    Canceled,
}

impl PlusStatus {
    /// Maps a provider subscription status string onto our state.
    ///
    /// Anything outside the statuses we track (incomplete, unpaid,
    /// trialing variants the product does not use) collapses to
    /// Canceled so access is denied rather than granted by accident.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => PlusStatus::Active,
            "past_due" => PlusStatus::PastDue,
            _ => PlusStatus::Canceled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlusStatus::None => "none",
            PlusStatus::Active => "active",
            PlusStatus::PastDue => "past_due",
            PlusStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "none" => Ok(PlusStatus::None),
            "active" => Ok(PlusStatus::Active),
            "past_due" => Ok(PlusStatus::PastDue),
            "canceled" => Ok(PlusStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "plus_status",
                format!("unknown plus status '{other}'"),
            )),
        }
    }
}

/// A user's entitlement state.
///
/// `has_plus` is always equal to `plus_status == Active`. All
/// mutation goes through the `apply_*` methods, which maintain that
/// equivalence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    pub id: Uuid,
    pub user_id: UserId,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub plus_status: PlusStatus,
    pub has_plus: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entitlement {
    /// A fresh record for a user with no payment history.
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            provider_customer_id: None,
            provider_subscription_id: None,
            plus_status: PlusStatus::None,
            has_plus: false,
            current_period_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Activates Plus after a completed subscription checkout.
    pub fn apply_subscription_started(
        &mut self,
        subscription_id: impl Into<String>,
        period_end: Option<DateTime<Utc>>,
    ) {
        self.provider_subscription_id = Some(subscription_id.into());
        self.set_status(PlusStatus::Active);
        self.current_period_end = period_end;
    }

    /// Records a successful renewal payment, extending the period.
    pub fn apply_renewal(&mut self, period_end: Option<DateTime<Utc>>) {
        self.set_status(PlusStatus::Active);
        if period_end.is_some() {
            self.current_period_end = period_end;
        }
        self.updated_at = Utc::now();
    }

    /// Applies a provider-reported status change.
    pub fn apply_status_change(
        &mut self,
        status: PlusStatus,
        period_end: Option<DateTime<Utc>>,
    ) {
        self.set_status(status);
        if period_end.is_some() {
            self.current_period_end = period_end;
        }
    }

    /// Handles subscription deletion. Access ends immediately.
    pub fn apply_subscription_deleted(&mut self) {
        self.set_status(PlusStatus::Canceled);
    }

    fn set_status(&mut self, status: PlusStatus) {
        self.plus_status = status;
        self.has_plus = status == PlusStatus::Active;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entitlement() -> Entitlement {
        Entitlement::new(UserId::new("user-1").unwrap())
    }

    // Unit Tests - PlusStatus mapping

    #[test]
    fn provider_active_maps_to_active() {
        assert_eq!(PlusStatus::from_provider("active"), PlusStatus::Active);
    }

    #[test]
    fn provider_past_due_maps_to_past_due() {
        assert_eq!(PlusStatus::from_provider("past_due"), PlusStatus::PastDue);
    }

    #[test]
    fn unrecognized_provider_status_collapses_to_canceled() {
        for status in ["canceled", "incomplete", "unpaid", "trialing", "garbage"] {
            assert_eq!(PlusStatus::from_provider(status), PlusStatus::Canceled);
        }
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for status in [
            PlusStatus::None,
            PlusStatus::Active,
            PlusStatus::PastDue,
            PlusStatus::Canceled,
        ] {
            assert_eq!(PlusStatus::parse(status.as_str()), Ok(status));
        }
    }

    // Unit Tests - Entitlement mutations

    #[test]
    fn new_entitlement_has_no_access() {
        let e = entitlement();
        assert_eq!(e.plus_status, PlusStatus::None);
        assert!(!e.has_plus);
        assert!(e.provider_subscription_id.is_none());
    }

    #[test]
    fn subscription_start_activates_plus() {
        let mut e = entitlement();
        let period_end = Utc::now() + Duration::days(30);
        e.apply_subscription_started("sub_123", Some(period_end));

        assert_eq!(e.plus_status, PlusStatus::Active);
        assert!(e.has_plus);
        assert_eq!(e.provider_subscription_id.as_deref(), Some("sub_123"));
        assert_eq!(e.current_period_end, Some(period_end));
    }

    #[test]
    fn renewal_extends_period_and_reactivates() {
        let mut e = entitlement();
        e.apply_subscription_started("sub_123", Some(Utc::now()));
        e.apply_status_change(PlusStatus::PastDue, None);
        assert!(!e.has_plus);

        let new_end = Utc::now() + Duration::days(30);
        e.apply_renewal(Some(new_end));
        assert_eq!(e.plus_status, PlusStatus::Active);
        assert!(e.has_plus);
        assert_eq!(e.current_period_end, Some(new_end));
    }

    #[test]
    fn renewal_without_period_keeps_existing_end() {
        let mut e = entitlement();
        let original_end = Utc::now() + Duration::days(30);
        e.apply_subscription_started("sub_123", Some(original_end));
        e.apply_renewal(None);
        assert_eq!(e.current_period_end, Some(original_end));
    }

    #[test]
    fn past_due_revokes_access_flag() {
        let mut e = entitlement();
        e.apply_subscription_started("sub_123", None);
        e.apply_status_change(PlusStatus::PastDue, None);

        assert_eq!(e.plus_status, PlusStatus::PastDue);
        assert!(!e.has_plus);
    }

    #[test]
    fn deletion_revokes_access_immediately() {
        let mut e = entitlement();
        e.apply_subscription_started("sub_123", None);
        e.apply_subscription_deleted();

        assert_eq!(e.plus_status, PlusStatus::Canceled);
        assert!(!e.has_plus);
    }

    #[test]
    fn has_plus_always_tracks_active_status() {
        let mut e = entitlement();
        for status in [
            PlusStatus::Active,
            PlusStatus::PastDue,
            PlusStatus::Canceled,
            PlusStatus::Active,
        ] {
            e.apply_status_change(status, None);
            assert_eq!(e.has_plus, e.plus_status == PlusStatus::Active);
        }
    }
}
