//! Billing service entry point.
//!
//! Loads configuration, connects to Postgres, wires the adapters to
//! the application handlers, and serves the billing API.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use amoura_billing::adapters::http::billing::{billing_router, BillingAppState};
use amoura_billing::adapters::postgres::{
    PostgresEntitlementStore, PostgresEventLedger, PostgresPurchaseLog,
};
use amoura_billing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use amoura_billing::application::{
    CheckoutLease, EntitlementQueryService, HandleWebhookHandler, StartCheckoutHandler,
};
use amoura_billing::config::{AppConfig, PaymentConfig};
use amoura_billing::domain::entitlement::{
    CatalogEntry, PriceBook, WebhookReconciler, WebhookVerifier,
};
use amoura_billing::ports::EventLedger;

/// How long processed event ids are retained for replay detection.
const LEDGER_RETENTION_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    init_tracing(&config);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        "starting amoura-billing"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let store = Arc::new(PostgresEntitlementStore::new(pool.clone()));
    let ledger: Arc<dyn EventLedger> = Arc::new(PostgresEventLedger::new(pool.clone()));
    let purchases = Arc::new(PostgresPurchaseLog::new(pool));

    let stripe_config = StripeConfig::new(config.payment.stripe_api_key.clone());
    let provider = Arc::new(StripePaymentAdapter::new(stripe_config)?);

    let prices = build_price_book(&config.payment);

    let checkout = StartCheckoutHandler::new(
        store.clone(),
        provider.clone(),
        Arc::new(CheckoutLease::new()),
        prices,
        config.payment.checkout_success_url.clone(),
        config.payment.checkout_cancel_url.clone(),
    );

    let reconciler = WebhookReconciler::new(
        store.clone(),
        ledger.clone(),
        provider.clone(),
        purchases.clone(),
        config.payment.require_livemode,
    );
    let webhook = HandleWebhookHandler::new(
        WebhookVerifier::new(config.payment.stripe_webhook_secret.clone()),
        reconciler,
    );

    let queries = EntitlementQueryService::new(store, provider, purchases);

    let state = BillingAppState {
        checkout: Arc::new(checkout),
        webhook: Arc::new(webhook),
        queries: Arc::new(queries),
    };

    spawn_ledger_sweeper(ledger);

    let app = Router::new()
        .nest("/api", billing_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config));

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Builds the price book from whichever catalog prices are configured.
///
/// Missing entries are simply absent; the checkout handler reports a
/// configuration error if such an entry is requested.
fn build_price_book(payment: &PaymentConfig) -> PriceBook {
    let entries = [
        (CatalogEntry::MomentPrivate, &payment.moment_private_price_id),
        (
            CatalogEntry::MomentIntimate,
            &payment.moment_intimate_price_id,
        ),
        (
            CatalogEntry::MomentExclusive,
            &payment.moment_exclusive_price_id,
        ),
        (CatalogEntry::Media, &payment.media_price_id),
        (CatalogEntry::Plus, &payment.plus_price_id),
    ];

    let mut book = PriceBook::new();
    for (entry, price_id) in entries {
        if let Some(price_id) = price_id {
            book = book.with_price(entry, price_id.clone());
        }
    }
    book
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .server
        .cors_origins_list()
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Periodically prunes old ledger rows.
///
/// Provider retries stop well inside the retention window, so rows
/// older than it only cost storage.
fn spawn_ledger_sweeper(ledger: Arc<dyn EventLedger>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(LEDGER_RETENTION_DAYS);
            match ledger.delete_before(cutoff).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "pruned processed event ledger");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "ledger prune failed");
                }
            }
        }
    });
}
