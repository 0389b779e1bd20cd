//! HTTP handlers for billing endpoints.
//!
//! These handlers connect Axum routes to the application layer.

use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::{
    EntitlementQueryService, HandleWebhookHandler, StartCheckoutCommand, StartCheckoutHandler,
};
use crate::domain::entitlement::{BillingError, CheckoutRequest, WebhookError};
use crate::domain::foundation::UserId;

use super::dto::{
    CheckoutResponse, EntitlementsResponse, ErrorResponse, UnlockCheckRequest,
    UnlockCheckResponse, VerifySessionParams, VerifySessionResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; the handlers are Arc-wrapped so the clones are
/// cheap.
#[derive(Clone)]
pub struct BillingAppState {
    pub checkout: Arc<StartCheckoutHandler>,
    pub webhook: Arc<HandleWebhookHandler>,
    pub queries: Arc<EntitlementQueryService>,
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Authenticated user context extracted from request.
///
/// Identity is established upstream by the platform's auth layer,
/// which forwards the subject in an X-User-Id header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> axum::response::Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

fn user_from_parts(parts: &axum::http::request::Parts) -> Option<UserId> {
    parts
        .headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::new(s).ok())
}

impl<S> axum::extract::FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let user_id = user_from_parts(parts).ok_or(AuthenticationRequired)?;
            Ok(AuthenticatedUser { user_id })
        })
    }
}

/// Optional variant of [`AuthenticatedUser`].
///
/// The entitlements endpoint serves anonymous visitors too; they get
/// an empty snapshot instead of a 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticatedUser(pub Option<UserId>);

impl<S> axum::extract::FromRequestParts<S> for MaybeAuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move { Ok(MaybeAuthenticatedUser(user_from_parts(parts))) })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/billing/checkout - Start a checkout session
pub async fn create_checkout(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let cmd = StartCheckoutCommand {
        user_id: user.user_id,
        request,
    };

    let session = state.checkout.handle(cmd).await?;

    let response = CheckoutResponse {
        session_id: session.id,
        checkout_url: session.url,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/billing/entitlements - Current user's entitlement snapshot
///
/// Anonymous requests get the empty snapshot.
pub async fn get_entitlements(
    State(state): State<BillingAppState>,
    user: MaybeAuthenticatedUser,
) -> Result<impl IntoResponse, BillingApiError> {
    let response = match user.0 {
        Some(user_id) => {
            let snapshot = state.queries.get_entitlements(&user_id).await?;
            EntitlementsResponse::from(snapshot)
        }
        None => EntitlementsResponse::anonymous(),
    };

    Ok(Json(response))
}

/// POST /api/billing/unlocks/check - Check access to one content item
///
/// Anonymous callers are denied without touching storage.
pub async fn check_unlock(
    State(state): State<BillingAppState>,
    user: MaybeAuthenticatedUser,
    Json(request): Json<UnlockCheckRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let key = request
        .into_key()
        .map_err(|e| BillingError::Validation(e.to_string()))?;

    let decision = match user.0 {
        Some(user_id) => state.queries.check_unlock(&user_id, &key).await?,
        None => crate::domain::entitlement::AccessDecision::denied(),
    };

    Ok(Json(UnlockCheckResponse::from(decision)))
}

/// GET /api/billing/session - Verify a checkout session after redirect
pub async fn verify_session(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Query(params): Query<VerifySessionParams>,
) -> Result<impl IntoResponse, BillingApiError> {
    let confirmation = state
        .queries
        .verify_session(&user.user_id, &params.session_id)
        .await?;

    Ok(Json(VerifySessionResponse::from(confirmation)))
}

/// POST /api/webhooks/stripe - Handle Stripe webhook events
///
/// No user auth; the request is authenticated by its signature over
/// the raw body. The returned status steers the provider's retry
/// loop, so only transient failures map to 5xx.
pub async fn handle_stripe_webhook(
    State(state): State<BillingAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;

    state.webhook.handle(&body, signature).await?;

    Ok(StatusCode::OK)
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper for checkout and query endpoints.
pub struct BillingApiError(BillingError);

impl From<BillingError> for BillingApiError {
    fn from(err: BillingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let code = match &self.0 {
            BillingError::Validation(_) => "VALIDATION_FAILED",
            BillingError::Configuration(_) => "CONFIGURATION_ERROR",
            BillingError::CheckoutInFlight => "CHECKOUT_IN_FLIGHT",
            BillingError::Provider(_) => "PROVIDER_ERROR",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Database(_) => "INTERNAL_ERROR",
        };
        let body = ErrorResponse::new(code, self.0.to_string());
        (status, Json(body)).into_response()
    }
}

/// API error wrapper for the webhook endpoint.
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let body = ErrorResponse::new("WEBHOOK_ERROR", self.0.to_string());
        (status, Json(body)).into_response()
    }
}
