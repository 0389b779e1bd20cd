//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST
//! API. Webhook signature verification lives in the domain layer;
//! this adapter only drives outbound calls.
//!
//! # Security
//!
//! Secrets are held via `secrecy::SecretString` and only exposed at
//! the point of use. All requests carry a bounded timeout so a
//! stalled provider fails closed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer, PaymentError,
    PaymentErrorCode, PaymentProvider, ProviderSubscription, SessionStatus,
};

/// Default request timeout for Stripe API calls.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Override the API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PaymentError::new(PaymentErrorCode::Unknown, e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        self.http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, PaymentError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        self.http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, error = %error_text, "Stripe API call failed");

        let code = match status.as_u16() {
            401 | 403 => PaymentErrorCode::AuthenticationError,
            429 => PaymentErrorCode::RateLimitExceeded,
            _ => PaymentErrorCode::ProviderError,
        };
        Err(PaymentError::new(code, format!("Stripe API error: {error_text}"))
            .with_provider_code(status.as_str().to_string()))
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        response.json().await.map_err(|e| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                format!("Failed to parse Stripe response: {e}"),
            )
        })
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let params = vec![("metadata[user_id]", request.user_id.to_string())];

        let response = self.post_form("/v1/customers", &params).await?;
        let response = Self::check_status(response).await?;
        let customer: StripeCustomer = Self::parse_json(response).await?;

        Ok(Customer { id: customer.id })
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let metadata_params: Vec<(String, String)> = request
            .metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.clone()))
            .collect();

        let mut params = vec![
            ("customer", request.customer_id.clone()),
            ("mode", request.mode.as_str().to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];
        for (key, value) in &metadata_params {
            params.push((key.as_str(), value.clone()));
        }

        let response = self.post_form("/v1/checkout/sessions", &params).await?;
        let response = Self::check_status(response).await?;
        let session: StripeCheckoutSessionResponse = Self::parse_json(response).await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::new(
                PaymentErrorCode::ProviderError,
                "checkout session created without a URL",
            )
        })?;

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let response = self.get(&format!("/v1/subscriptions/{subscription_id}")).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let subscription: StripeSubscriptionResponse = Self::parse_json(response).await?;

        Ok(Some(ProviderSubscription {
            id: subscription.id,
            customer_id: subscription.customer,
            status: subscription.status,
            current_period_end: subscription.current_period_end,
        }))
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionStatus>, PaymentError> {
        let response = self.get(&format!("/v1/checkout/sessions/{session_id}")).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check_status(response).await?;
        let session: StripeCheckoutSessionResponse = Self::parse_json(response).await?;

        Ok(Some(SessionStatus {
            id: session.id,
            payment_status: session.payment_status.unwrap_or_default(),
            metadata: session.metadata,
        }))
    }
}

// Stripe wire types, limited to the fields we read.

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct StripeSubscriptionResponse {
    id: String,
    customer: String,
    status: String,
    #[serde(default)]
    current_period_end: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_stripe_api() {
        let config = StripeConfig::new("sk_test_123");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
    }

    #[test]
    fn base_url_override_for_tests() {
        let config = StripeConfig::new("sk_test_123").with_base_url("http://localhost:12111");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn wire_types_parse_stripe_shapes() {
        let session: StripeCheckoutSessionResponse = serde_json::from_str(
            r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/pay/cs_test_1","payment_status":"unpaid","metadata":{"user_id":"user-1"}}"#,
        )
        .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.payment_status.as_deref(), Some("unpaid"));
        assert_eq!(
            session.metadata.get("user_id").map(String::as_str),
            Some("user-1")
        );

        let subscription: StripeSubscriptionResponse = serde_json::from_str(
            r#"{"id":"sub_1","customer":"cus_1","status":"active","current_period_end":1890000000}"#,
        )
        .unwrap();
        assert_eq!(subscription.status, "active");
        assert_eq!(subscription.current_period_end, Some(1890000000));
    }

    #[test]
    fn retrieved_session_without_optional_fields_parses() {
        let session: StripeCheckoutSessionResponse =
            serde_json::from_str(r#"{"id":"cs_test_2"}"#).unwrap();
        assert!(session.url.is_none());
        assert!(session.payment_status.is_none());
    }
}
