//! StartCheckoutHandler - initiates a provider checkout session.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::checkout_lease::CheckoutLease;
use crate::domain::entitlement::{BillingError, CheckoutRequest, PriceBook, PurchaseIntent};
use crate::domain::foundation::UserId;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, EntitlementStore,
    PaymentProvider,
};

/// Command to start a checkout.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user_id: UserId,
    pub request: CheckoutRequest,
}

/// Handler for starting checkouts.
///
/// Normalizes the request into a typed purchase intent, ensures the
/// user has a provider customer, and creates the checkout session
/// with the metadata the reconciler needs to grant the purchase.
pub struct StartCheckoutHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    lease: Arc<CheckoutLease>,
    prices: PriceBook,
    success_url: String,
    cancel_url: String,
}

impl StartCheckoutHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        provider: Arc<dyn PaymentProvider>,
        lease: Arc<CheckoutLease>,
        prices: PriceBook,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            lease,
            prices,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<CheckoutSession, BillingError> {
        let intent = cmd
            .request
            .into_intent(&self.prices)
            .map_err(|e| BillingError::Validation(e.to_string()))?;

        if !self.lease.acquire(cmd.user_id.as_str()).await {
            return Err(BillingError::CheckoutInFlight);
        }

        let result = self.start_session(&cmd.user_id, &intent).await;
        self.lease.release(cmd.user_id.as_str()).await;
        result
    }

    async fn start_session(
        &self,
        user_id: &UserId,
        intent: &PurchaseIntent,
    ) -> Result<CheckoutSession, BillingError> {
        let entry = intent.catalog_entry();
        let price_id = self.prices.price_for(entry).ok_or_else(|| {
            BillingError::Configuration(format!("no price configured for {}", entry.name()))
        })?;

        let customer_id = self.ensure_customer(user_id).await?;

        let mut metadata = vec![("user_id", user_id.as_str().to_string())];
        metadata.extend(intent.to_metadata());

        let session = self
            .provider
            .create_checkout_session(CreateCheckoutRequest {
                customer_id,
                price_id: price_id.to_string(),
                mode: entry.mode(),
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
                metadata,
            })
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, error = %e, "checkout session creation failed");
                BillingError::Provider(e.to_string())
            })?;

        info!(
            user_id = %user_id,
            session_id = %session.id,
            entry = entry.name(),
            "checkout session created"
        );
        Ok(session)
    }

    /// Resolves the user's provider customer id, creating one when
    /// missing. A concurrent creation race resolves first-write-wins
    /// in the store; the loser's customer id is simply unused.
    async fn ensure_customer(&self, user_id: &UserId) -> Result<String, BillingError> {
        if let Some(entitlement) = self.store.find_by_user(user_id).await? {
            if let Some(customer_id) = entitlement.provider_customer_id {
                return Ok(customer_id);
            }
        }

        let customer = self
            .provider
            .create_customer(CreateCustomerRequest {
                user_id: user_id.clone(),
            })
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let winner = self.store.ensure_customer(user_id, &customer.id).await?;
        winner
            .provider_customer_id
            .ok_or_else(|| BillingError::Database("customer claim returned no id".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{CatalogEntry, CheckoutMode, Entitlement};
    use crate::ports::entitlement_store::test_support::InMemoryEntitlementStore;
    use crate::ports::{Customer, PaymentError, ProviderSubscription, SessionStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    // ════════════════════════════════════════════════════════════════════════════
    // Mock Implementations
    // ════════════════════════════════════════════════════════════════════════════

    struct MockPaymentProvider {
        customer_calls: AtomicU32,
        last_checkout: Mutex<Option<CreateCheckoutRequest>>,
        fail_checkout: bool,
    }

    impl MockPaymentProvider {
        fn new() -> Self {
            Self {
                customer_calls: AtomicU32::new(0),
                last_checkout: Mutex::new(None),
                fail_checkout: false,
            }
        }

        fn failing_checkout() -> Self {
            Self {
                fail_checkout: true,
                ..Self::new()
            }
        }

        fn last_checkout(&self) -> Option<CreateCheckoutRequest> {
            self.last_checkout.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPaymentProvider {
        async fn create_customer(
            &self,
            request: CreateCustomerRequest,
        ) -> Result<Customer, PaymentError> {
            self.customer_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Customer {
                id: format!("cus_{}", request.user_id),
            })
        }

        async fn create_checkout_session(
            &self,
            request: CreateCheckoutRequest,
        ) -> Result<CheckoutSession, PaymentError> {
            if self.fail_checkout {
                return Err(PaymentError::provider("session creation failed"));
            }
            *self.last_checkout.lock().unwrap() = Some(request);
            Ok(CheckoutSession {
                id: "cs_123".to_string(),
                url: "https://checkout.stripe.com/cs_123".to_string(),
            })
        }

        async fn get_subscription(
            &self,
            _subscription_id: &str,
        ) -> Result<Option<ProviderSubscription>, PaymentError> {
            Ok(None)
        }

        async fn get_checkout_session(
            &self,
            _session_id: &str,
        ) -> Result<Option<SessionStatus>, PaymentError> {
            Ok(None)
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Test Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn prices() -> PriceBook {
        PriceBook::new()
            .with_price(CatalogEntry::MomentPrivate, "price_priv")
            .with_price(CatalogEntry::MomentIntimate, "price_int")
            .with_price(CatalogEntry::MomentExclusive, "price_exc")
            .with_price(CatalogEntry::Media, "price_media")
            .with_price(CatalogEntry::Plus, "price_plus")
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn handler(
        store: Arc<InMemoryEntitlementStore>,
        provider: Arc<MockPaymentProvider>,
        prices: PriceBook,
    ) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            store,
            provider,
            Arc::new(CheckoutLease::new()),
            prices,
            "https://app.example.com/payment/success",
            "https://app.example.com/payment/cancel",
        )
    }

    fn moment_command() -> StartCheckoutCommand {
        StartCheckoutCommand {
            user_id: user(),
            request: CheckoutRequest {
                purchase_type: Some("moment".to_string()),
                character_id: Some("char-1".to_string()),
                situation_id: Some("sit-1".to_string()),
                moment_level: Some("exclusive".to_string()),
                ..Default::default()
            },
        }
    }

    fn plus_command() -> StartCheckoutCommand {
        StartCheckoutCommand {
            user_id: user(),
            request: CheckoutRequest {
                purchase_type: Some("plus".to_string()),
                ..Default::default()
            },
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Success Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_session_with_intent_metadata() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store, provider.clone(), prices());

        let session = handler.handle(moment_command()).await.unwrap();

        assert!(session.url.contains("checkout.stripe.com"));
        let request = provider.last_checkout().unwrap();
        assert_eq!(request.price_id, "price_exc");
        assert_eq!(request.mode, CheckoutMode::Payment);
        assert!(request
            .metadata
            .contains(&("user_id", "user-1".to_string())));
        assert!(request
            .metadata
            .contains(&("moment_level", "exclusive".to_string())));
    }

    #[tokio::test]
    async fn plus_checkout_uses_subscription_mode() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store, provider.clone(), prices());

        handler.handle(plus_command()).await.unwrap();

        let request = provider.last_checkout().unwrap();
        assert_eq!(request.price_id, "price_plus");
        assert_eq!(request.mode, CheckoutMode::Subscription);
    }

    #[tokio::test]
    async fn creates_customer_and_claims_it() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store.clone(), provider.clone(), prices());

        handler.handle(moment_command()).await.unwrap();

        assert_eq!(provider.customer_calls.load(Ordering::SeqCst), 1);
        let e = store.find_by_user(&user()).await.unwrap().unwrap();
        assert_eq!(e.provider_customer_id.as_deref(), Some("cus_user-1"));
    }

    #[tokio::test]
    async fn reuses_existing_customer() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let mut existing = Entitlement::new(user());
        existing.provider_customer_id = Some("cus_existing".to_string());
        store.seed(existing).await;

        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store, provider.clone(), prices());

        handler.handle(moment_command()).await.unwrap();

        assert_eq!(provider.customer_calls.load(Ordering::SeqCst), 0);
        let request = provider.last_checkout().unwrap();
        assert_eq!(request.customer_id, "cus_existing");
    }

    #[tokio::test]
    async fn racing_customer_claim_uses_winner() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        // Another instance claimed a customer id between our lookup
        // miss and our claim.
        store.ensure_customer(&user(), "cus_winner").await.unwrap();

        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store, provider.clone(), prices());

        // Seeded row already carries a customer, so lookup finds it
        handler.handle(moment_command()).await.unwrap();
        let request = provider.last_checkout().unwrap();
        assert_eq!(request.customer_id, "cus_winner");
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Failure Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn malformed_request_is_rejected() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let handler = handler(store, provider, prices());

        let cmd = StartCheckoutCommand {
            user_id: user(),
            request: CheckoutRequest::default(),
        };

        let result = handler.handle(cmd).await;
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[tokio::test]
    async fn unconfigured_price_is_a_configuration_error() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::new());
        // Price book missing the moment tiers
        let handler = handler(
            store,
            provider,
            PriceBook::new().with_price(CatalogEntry::Plus, "price_plus"),
        );

        let result = handler.handle(moment_command()).await;
        match result {
            Err(BillingError::Configuration(message)) => {
                assert!(message.contains("moment_exclusive"));
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn provider_failure_surfaces_and_releases_lease() {
        let store = Arc::new(InMemoryEntitlementStore::new());
        let provider = Arc::new(MockPaymentProvider::failing_checkout());
        let handler = handler(store, provider, prices());

        let result = handler.handle(moment_command()).await;
        assert!(matches!(result, Err(BillingError::Provider(_))));

        // A failed attempt must not leave the user leased out
        let retry = handler.handle(moment_command()).await;
        assert!(matches!(retry, Err(BillingError::Provider(_))));
    }
}
