//! Axum router configuration for billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    check_unlock, create_checkout, get_entitlements, handle_stripe_webhook, verify_session,
    BillingAppState,
};

/// Create the billing API router.
///
/// # Routes
///
/// ## User Endpoints (require authentication)
/// - `POST /checkout` - Start a checkout session
/// - `POST /unlocks/check` - Check access to one content item
/// - `GET /session` - Verify a checkout session after redirect
///
/// ## Public Endpoints
/// - `GET /entitlements` - Entitlement snapshot (empty when anonymous)
pub fn billing_routes() -> Router<BillingAppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/entitlements", get(get_entitlements))
        .route("/unlocks/check", post(check_unlock))
        .route("/session", get(verify_session))
}

/// Create the Stripe webhook router.
///
/// Separate from the billing routes because webhooks carry no user
/// authentication; they are verified via signature.
pub fn webhook_routes() -> Router<BillingAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete billing module router, suitable for mounting
/// at `/api`.
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        .nest("/billing", billing_routes())
        .nest("/webhooks", webhook_routes())
}
