//! Payment configuration (Stripe keys and catalog price references)

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration.
///
/// Price references map catalog entries to provider price IDs. A missing
/// reference is a `ConfigurationError` at checkout time, never a silent
/// fallback to a wrong price.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Price ID for a private-tier moment unlock
    pub moment_private_price_id: Option<String>,

    /// Price ID for an intimate-tier moment unlock
    pub moment_intimate_price_id: Option<String>,

    /// Price ID for an exclusive-tier moment unlock
    pub moment_exclusive_price_id: Option<String>,

    /// Price ID for a media unlock
    pub media_price_id: Option<String>,

    /// Price ID for the Plus subscription
    pub plus_price_id: Option<String>,

    /// Redirect URL after a successful checkout
    #[serde(default = "default_success_url")]
    pub checkout_success_url: String,

    /// Redirect URL after a cancelled checkout
    #[serde(default = "default_cancel_url")]
    pub checkout_cancel_url: String,

    /// Reject test-mode webhook events (set in production)
    #[serde(default)]
    pub require_livemode: bool,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.checkout_success_url.is_empty() || self.checkout_cancel_url.is_empty() {
            return Err(ValidationError::InvalidRedirectUrl);
        }

        Ok(())
    }
}

fn default_success_url() -> String {
    "/payment/success?session_id={CHECKOUT_SESSION_ID}".to_string()
}

fn default_cancel_url() -> String {
    "/payment/cancelled".to_string()
}
