//! HTTP DTOs for billing endpoints.
//!
//! JSON request/response shapes at the boundary between HTTP and the
//! application layer. The checkout request body itself lives in the
//! domain (it is normalized there); everything else is defined here.

use serde::{Deserialize, Serialize};

use crate::application::{EntitlementSnapshot, SessionConfirmation};
use crate::domain::entitlement::{AccessDecision, MomentLevel, UnlockKey};
use crate::domain::foundation::ValidationError;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to check access to a single content item.
///
/// The plain moment shape is `{characterId, situationId, momentLevel}`;
/// media checks carry `mediaId` instead. An explicit `contentType`
/// ("moment" or "media") is also accepted and wins when present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockCheckRequest {
    #[serde(default)]
    pub content_type: Option<String>,
    pub character_id: String,
    #[serde(default)]
    pub situation_id: Option<String>,
    #[serde(default)]
    pub moment_level: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
}

impl UnlockCheckRequest {
    /// Builds the typed unlock key this request identifies.
    ///
    /// Without an explicit `contentType`, a present `mediaId` selects
    /// the media shape; anything else is a moment check.
    pub fn into_key(self) -> Result<UnlockKey, ValidationError> {
        let content_type = match self.content_type.as_deref() {
            Some("moment") => "moment",
            Some("media") => "media",
            Some(other) => {
                return Err(ValidationError::invalid_format(
                    "contentType",
                    format!("unknown content type '{other}'"),
                ))
            }
            None if self.media_id.is_some() => "media",
            None => "moment",
        };

        match content_type {
            "media" => {
                let media_id = self
                    .media_id
                    .ok_or_else(|| ValidationError::empty_field("mediaId"))?;
                UnlockKey::media(self.character_id, media_id)
            }
            _ => {
                let situation_id = self
                    .situation_id
                    .ok_or_else(|| ValidationError::empty_field("situationId"))?;
                let level_str = self
                    .moment_level
                    .ok_or_else(|| ValidationError::empty_field("momentLevel"))?;
                let level = MomentLevel::parse(&level_str)?;
                UnlockKey::moment(self.character_id, situation_id, level)
            }
        }
    }
}

/// Query parameters for session verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionParams {
    pub session_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Response after starting a checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

/// Response for the entitlements snapshot endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementsResponse {
    pub authenticated: bool,
    pub has_plus: bool,
    pub plus_status: String,
    pub unlocks: Vec<serde_json::Value>,
}

impl EntitlementsResponse {
    /// The snapshot served to anonymous visitors.
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            has_plus: false,
            plus_status: "none".to_string(),
            unlocks: Vec::new(),
        }
    }
}

impl From<EntitlementSnapshot> for EntitlementsResponse {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        let unlocks = snapshot
            .unlocks
            .iter()
            .map(|u| serde_json::to_value(&u.key).unwrap_or(serde_json::Value::Null))
            .collect();
        Self {
            authenticated: true,
            has_plus: snapshot.has_plus,
            plus_status: snapshot.plus_status.as_str().to_string(),
            unlocks,
        }
    }
}

/// Response for an unlock access check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockCheckResponse {
    pub is_unlocked: bool,
    pub reason: crate::domain::entitlement::AccessReason,
}

impl From<AccessDecision> for UnlockCheckResponse {
    fn from(decision: AccessDecision) -> Self {
        Self {
            is_unlocked: decision.is_unlocked,
            reason: decision.reason,
        }
    }
}

/// Response for session verification after the success redirect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionResponse {
    pub paid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entitlements: Option<EntitlementsResponse>,
}

impl From<SessionConfirmation> for VerifySessionResponse {
    fn from(confirmation: SessionConfirmation) -> Self {
        Self {
            paid: confirmation.paid,
            entitlements: confirmation.entitlements.map(EntitlementsResponse::from),
        }
    }
}

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moment_check_request_builds_key() {
        let request = UnlockCheckRequest {
            content_type: Some("moment".to_string()),
            character_id: "char-1".to_string(),
            situation_id: Some("sit-1".to_string()),
            moment_level: Some("intimate".to_string()),
            media_id: None,
        };

        let key = request.into_key().unwrap();
        assert_eq!(
            key,
            UnlockKey::moment("char-1", "sit-1", MomentLevel::Intimate).unwrap()
        );
    }

    #[test]
    fn media_check_request_builds_key() {
        let request = UnlockCheckRequest {
            content_type: Some("media".to_string()),
            character_id: "char-1".to_string(),
            situation_id: None,
            moment_level: None,
            media_id: Some("med-1".to_string()),
        };

        let key = request.into_key().unwrap();
        assert_eq!(key, UnlockKey::media("char-1", "med-1").unwrap());
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let request = UnlockCheckRequest {
            content_type: Some("bundle".to_string()),
            character_id: "char-1".to_string(),
            situation_id: None,
            moment_level: None,
            media_id: None,
        };

        assert!(request.into_key().is_err());
    }

    #[test]
    fn moment_check_without_level_is_rejected() {
        let request = UnlockCheckRequest {
            content_type: Some("moment".to_string()),
            character_id: "char-1".to_string(),
            situation_id: Some("sit-1".to_string()),
            moment_level: None,
            media_id: None,
        };

        assert!(request.into_key().is_err());
    }

    #[test]
    fn plain_moment_body_without_content_type_builds_moment_key() {
        let request: UnlockCheckRequest = serde_json::from_str(
            r#"{"characterId":"c1","situationId":"s1","momentLevel":"private"}"#,
        )
        .unwrap();

        let key = request.into_key().unwrap();
        assert_eq!(
            key,
            UnlockKey::moment("c1", "s1", MomentLevel::Private).unwrap()
        );
    }

    #[test]
    fn media_id_without_content_type_builds_media_key() {
        let request: UnlockCheckRequest =
            serde_json::from_str(r#"{"characterId":"c1","mediaId":"med-9"}"#).unwrap();

        let key = request.into_key().unwrap();
        assert_eq!(key, UnlockKey::media("c1", "med-9").unwrap());
    }

    #[test]
    fn request_parses_camel_case_json() {
        let request: UnlockCheckRequest = serde_json::from_str(
            r#"{"contentType":"moment","characterId":"c1","situationId":"s1","momentLevel":"private"}"#,
        )
        .unwrap();
        assert_eq!(request.content_type.as_deref(), Some("moment"));
        assert_eq!(request.moment_level.as_deref(), Some("private"));
    }

    #[test]
    fn verify_session_params_parse_camel_case() {
        let params: VerifySessionParams =
            serde_json::from_str(r#"{"sessionId":"cs_test_123"}"#).unwrap();
        assert_eq!(params.session_id, "cs_test_123");
    }

    #[test]
    fn checkout_response_serializes_camel_case() {
        let response = CheckoutResponse {
            session_id: "cs_test_123".to_string(),
            checkout_url: "https://checkout.stripe.com/pay/cs_test_123".to_string(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "sessionId": "cs_test_123",
                "checkoutUrl": "https://checkout.stripe.com/pay/cs_test_123",
            })
        );
    }

    #[test]
    fn entitlements_response_serializes_camel_case() {
        let response = EntitlementsResponse {
            authenticated: true,
            has_plus: true,
            plus_status: "active".to_string(),
            unlocks: vec![serde_json::json!({
                "type": "moment",
                "characterId": "c1",
                "situationId": "s1",
                "level": "private",
            })],
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["authenticated"], true);
        assert_eq!(value["hasPlus"], true);
        assert_eq!(value["plusStatus"], "active");
        assert_eq!(value["unlocks"][0]["characterId"], "c1");
    }

    #[test]
    fn unlock_check_response_serializes_camel_case() {
        let response = UnlockCheckResponse {
            is_unlocked: true,
            reason: crate::domain::entitlement::AccessReason::Plus,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"isUnlocked": true, "reason": "plus"})
        );
    }

    #[test]
    fn unpaid_verify_response_omits_entitlements() {
        let response = VerifySessionResponse {
            paid: false,
            entitlements: None,
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, serde_json::json!({"paid": false}));
    }
}
