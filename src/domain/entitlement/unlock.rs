//! One-time content unlocks.
//!
//! A user either owns an unlock or does not. Unlocks are never
//! revoked and never expire, so the record is append-only and
//! uniquely keyed per user and content item.

use crate::domain::foundation::{UserId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sensitivity tier of a paywalled moment.
///
/// Tier ordering matters for access control: a Plus subscription
/// covers Private and Intimate moments but never Exclusive ones,
/// which must always be purchased individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentLevel {
    Private,
    Intimate,
    Exclusive,
}

impl MomentLevel {
    /// Parses the wire representation used in metadata and API payloads.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "private" => Ok(MomentLevel::Private),
            "intimate" => Ok(MomentLevel::Intimate),
            "exclusive" => Ok(MomentLevel::Exclusive),
            other => Err(ValidationError::invalid_format(
                "moment_level",
                format!("unknown moment level '{other}'"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MomentLevel::Private => "private",
            MomentLevel::Intimate => "intimate",
            MomentLevel::Exclusive => "exclusive",
        }
    }

    /// Whether an active Plus subscription grants access at this tier.
    pub fn covered_by_plus(&self) -> bool {
        !matches!(self, MomentLevel::Exclusive)
    }
}

/// Identity of a purchasable content item.
///
/// Moments are keyed by character, situation, and tier. Media items
/// (photo and video packs) are keyed by character and media id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum UnlockKey {
    Moment {
        character_id: String,
        situation_id: String,
        level: MomentLevel,
    },
    Media {
        character_id: String,
        media_id: String,
    },
}

impl UnlockKey {
    pub fn moment(
        character_id: impl Into<String>,
        situation_id: impl Into<String>,
        level: MomentLevel,
    ) -> Result<Self, ValidationError> {
        let character_id = character_id.into();
        let situation_id = situation_id.into();
        if character_id.is_empty() {
            return Err(ValidationError::empty_field("character_id"));
        }
        if situation_id.is_empty() {
            return Err(ValidationError::empty_field("situation_id"));
        }
        Ok(UnlockKey::Moment {
            character_id,
            situation_id,
            level,
        })
    }

    pub fn media(
        character_id: impl Into<String>,
        media_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let character_id = character_id.into();
        let media_id = media_id.into();
        if character_id.is_empty() {
            return Err(ValidationError::empty_field("character_id"));
        }
        if media_id.is_empty() {
            return Err(ValidationError::empty_field("media_id"));
        }
        Ok(UnlockKey::Media {
            character_id,
            media_id,
        })
    }

    pub fn character_id(&self) -> &str {
        match self {
            UnlockKey::Moment { character_id, .. } => character_id,
            UnlockKey::Media { character_id, .. } => character_id,
        }
    }

    /// The moment tier, if this key identifies a moment.
    pub fn moment_level(&self) -> Option<MomentLevel> {
        match self {
            UnlockKey::Moment { level, .. } => Some(*level),
            UnlockKey::Media { .. } => None,
        }
    }
}

/// A granted unlock.
///
/// Recorded when payment for a one-time purchase completes. The
/// originating checkout session id is kept for audit and for
/// correlating duplicate webhook deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unlock {
    pub id: Uuid,
    pub user_id: UserId,
    pub key: UnlockKey,
    pub checkout_session_id: String,
    pub granted_at: DateTime<Utc>,
}

impl Unlock {
    pub fn grant(user_id: UserId, key: UnlockKey, checkout_session_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            key,
            checkout_session_id: checkout_session_id.into(),
            granted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn unlock_key_serializes_with_type_tag_and_camel_case_fields() {
        let key = UnlockKey::moment("char-1", "sit-1", MomentLevel::Private).unwrap();
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "moment",
                "characterId": "char-1",
                "situationId": "sit-1",
                "level": "private"
            })
        );

        let key = UnlockKey::media("char-1", "med-9").unwrap();
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "media",
                "characterId": "char-1",
                "mediaId": "med-9"
            })
        );
    }

    // Unit Tests - MomentLevel

    #[test]
    fn parses_all_moment_levels() {
        assert_eq!(MomentLevel::parse("private"), Ok(MomentLevel::Private));
        assert_eq!(MomentLevel::parse("intimate"), Ok(MomentLevel::Intimate));
        assert_eq!(MomentLevel::parse("exclusive"), Ok(MomentLevel::Exclusive));
    }

    #[test]
    fn rejects_unknown_moment_level() {
        assert!(MomentLevel::parse("platinum").is_err());
        assert!(MomentLevel::parse("").is_err());
    }

    #[test]
    fn parse_round_trips_through_as_str() {
        for level in [
            MomentLevel::Private,
            MomentLevel::Intimate,
            MomentLevel::Exclusive,
        ] {
            assert_eq!(MomentLevel::parse(level.as_str()), Ok(level));
        }
    }

    #[test]
    fn plus_covers_private_and_intimate_only() {
        assert!(MomentLevel::Private.covered_by_plus());
        assert!(MomentLevel::Intimate.covered_by_plus());
        assert!(!MomentLevel::Exclusive.covered_by_plus());
    }

    // Unit Tests - UnlockKey

    #[test]
    fn moment_key_requires_character_and_situation() {
        assert!(UnlockKey::moment("", "sit-1", MomentLevel::Private).is_err());
        assert!(UnlockKey::moment("char-1", "", MomentLevel::Private).is_err());
        assert!(UnlockKey::moment("char-1", "sit-1", MomentLevel::Private).is_ok());
    }

    #[test]
    fn media_key_requires_character_and_media() {
        assert!(UnlockKey::media("", "med-1").is_err());
        assert!(UnlockKey::media("char-1", "").is_err());
        assert!(UnlockKey::media("char-1", "med-1").is_ok());
    }

    #[test]
    fn moment_level_accessor_only_for_moments() {
        let moment = UnlockKey::moment("char-1", "sit-1", MomentLevel::Exclusive).unwrap();
        let media = UnlockKey::media("char-1", "med-1").unwrap();
        assert_eq!(moment.moment_level(), Some(MomentLevel::Exclusive));
        assert_eq!(media.moment_level(), None);
    }

    #[test]
    fn grant_records_session_id() {
        let key = UnlockKey::media("char-1", "med-1").unwrap();
        let unlock = Unlock::grant(user(), key.clone(), "cs_test_123");
        assert_eq!(unlock.user_id, user());
        assert_eq!(unlock.key, key);
        assert_eq!(unlock.checkout_session_id, "cs_test_123");
    }
}
