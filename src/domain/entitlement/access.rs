//! Access decisions for paywalled content.
//!
//! Pure evaluation over an entitlement snapshot. The exclusive tier
//! is never covered by Plus; it must be purchased individually.

use serde::Serialize;

use crate::domain::entitlement::unlock::{Unlock, UnlockKey};

/// Why access was granted, if it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessReason {
    /// Covered by an active Plus subscription.
    Plus,
    /// Individually purchased.
    Purchased,
    /// No access.
    None,
}

/// Result of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub is_unlocked: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    pub fn granted(reason: AccessReason) -> Self {
        Self {
            is_unlocked: true,
            reason,
        }
    }

    pub fn denied() -> Self {
        Self {
            is_unlocked: false,
            reason: AccessReason::None,
        }
    }
}

/// Evaluates access to a content item.
///
/// Plus coverage is checked first, then individual purchase.
pub fn evaluate(key: &UnlockKey, has_plus: bool, unlocks: &[Unlock]) -> AccessDecision {
    if has_plus {
        let covered = match key.moment_level() {
            Some(level) => level.covered_by_plus(),
            // Media packs are always individual purchases
            None => false,
        };
        if covered {
            return AccessDecision::granted(AccessReason::Plus);
        }
    }

    if unlocks.iter().any(|u| &u.key == key) {
        return AccessDecision::granted(AccessReason::Purchased);
    }

    AccessDecision::denied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::unlock::MomentLevel;
    use crate::domain::foundation::UserId;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn moment(level: MomentLevel) -> UnlockKey {
        UnlockKey::moment("char-1", "sit-1", level).unwrap()
    }

    #[test]
    fn plus_covers_private_and_intimate_moments() {
        for level in [MomentLevel::Private, MomentLevel::Intimate] {
            let decision = evaluate(&moment(level), true, &[]);
            assert_eq!(decision, AccessDecision::granted(AccessReason::Plus));
        }
    }

    #[test]
    fn plus_never_covers_exclusive_moments() {
        let decision = evaluate(&moment(MomentLevel::Exclusive), true, &[]);
        assert_eq!(decision, AccessDecision::denied());
    }

    #[test]
    fn plus_never_covers_media() {
        let key = UnlockKey::media("char-1", "med-1").unwrap();
        let decision = evaluate(&key, true, &[]);
        assert_eq!(decision, AccessDecision::denied());
    }

    #[test]
    fn purchased_exclusive_moment_is_unlocked() {
        let key = moment(MomentLevel::Exclusive);
        let unlocks = vec![Unlock::grant(user(), key.clone(), "cs_1")];

        let decision = evaluate(&key, false, &unlocks);
        assert_eq!(decision, AccessDecision::granted(AccessReason::Purchased));
    }

    #[test]
    fn plus_reason_wins_when_a_covered_moment_was_also_purchased() {
        let key = moment(MomentLevel::Private);
        let unlocks = vec![Unlock::grant(user(), key.clone(), "cs_1")];

        let decision = evaluate(&key, true, &unlocks);
        assert_eq!(decision.reason, AccessReason::Plus);
    }

    #[test]
    fn purchased_exclusive_reports_purchased_even_with_plus() {
        let key = moment(MomentLevel::Exclusive);
        let unlocks = vec![Unlock::grant(user(), key.clone(), "cs_1")];

        let decision = evaluate(&key, true, &unlocks);
        assert_eq!(decision.reason, AccessReason::Purchased);
    }

    #[test]
    fn unlock_of_different_item_grants_nothing() {
        let owned = moment(MomentLevel::Exclusive);
        let other = UnlockKey::moment("char-1", "sit-2", MomentLevel::Exclusive).unwrap();
        let unlocks = vec![Unlock::grant(user(), owned, "cs_1")];

        let decision = evaluate(&other, false, &unlocks);
        assert_eq!(decision, AccessDecision::denied());
    }

    #[test]
    fn no_plus_no_purchase_is_denied() {
        let decision = evaluate(&moment(MomentLevel::Private), false, &[]);
        assert_eq!(decision, AccessDecision::denied());
    }
}
