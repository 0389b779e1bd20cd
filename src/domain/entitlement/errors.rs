//! Webhook processing error types.
//!
//! All error conditions the reconciliation path can hit, with HTTP
//! status mapping that drives the provider's retry behavior.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur while handling a provider webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Event is older than the acceptance window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse the signature header or the payload.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing from the event.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Required field missing from the event payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Test-mode event received while live mode is required.
    #[error("Test mode event rejected")]
    TestModeRejected,

    /// Event referenced state we could not correlate. Acknowledged
    /// and dropped after logging, never retried.
    #[error("Anomaly: {0}")]
    Anomaly(String),

    /// Payment provider call failed while enriching the event.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Whether the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Database(_) | WebhookError::Provider(_))
    }

    /// HTTP status to return for this error.
    ///
    /// The status determines the provider's retry behavior: 2xx is
    /// acknowledged, 4xx is dropped, 5xx is redelivered.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::TimestampOutOfRange => {
                StatusCode::UNAUTHORIZED
            }

            WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_)
            | WebhookError::MissingField(_)
            | WebhookError::TestModeRejected => StatusCode::BAD_REQUEST,

            // Anomalies are acknowledged so the provider stops retrying
            WebhookError::Anomaly(_) => StatusCode::OK,

            WebhookError::Provider(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Errors from the checkout and query paths.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Request failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A required price or URL is not configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Another checkout for this user is already in flight.
    #[error("Checkout already in progress")]
    CheckoutInFlight,

    /// The payment provider rejected or failed the request.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl BillingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::Validation(_) => StatusCode::BAD_REQUEST,
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::CheckoutInFlight => StatusCode::CONFLICT,
            BillingError::Provider(_) => StatusCode::BAD_GATEWAY,
            BillingError::Configuration(_) | BillingError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<crate::domain::foundation::ValidationError> for BillingError {
    fn from(err: crate::domain::foundation::ValidationError) -> Self {
        BillingError::Validation(err.to_string())
    }
}

impl From<crate::domain::foundation::DomainError> for BillingError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        BillingError::Database(err.to_string())
    }
}

impl From<crate::ports::payment_provider::PaymentError> for BillingError {
    fn from(err: crate::ports::payment_provider::PaymentError) -> Self {
        BillingError::Provider(err.to_string())
    }
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}
