//! Mercato storefront API server.
//!
//! # Architecture
//!
//! - Axum JSON API, bearer token authentication
//! - `PostgreSQL` order store (`mercato` schema)
//! - Stripe-compatible hosted checkout for payment
//! - Signed provider webhooks confirm payment
//!
//! Migrations are NOT run on startup. Run them explicitly via:
//! `cargo run -p mercato-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use mercato_storefront::checkout::stripe::StripeCheckoutClient;
use mercato_storefront::config::MercatoConfig;
use mercato_storefront::db::{self, PgAccountDirectory, PgOrderStore};
use mercato_storefront::services::CheckoutSettings;
use mercato_storefront::services::auth::TokenVerifier;
use mercato_storefront::state::{AppState, StateParts};
use mercato_storefront::webhooks::WebhookVerifier;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &MercatoConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = MercatoConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mercato_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let gateway =
        StripeCheckoutClient::new(&config.checkout).expect("Failed to build checkout client");

    let state = AppState::new(StateParts {
        store: Arc::new(PgOrderStore::new(pool.clone())),
        gateway: Arc::new(gateway),
        accounts: Arc::new(PgAccountDirectory::new(pool)),
        checkout: CheckoutSettings::from(&config.checkout),
        webhook_verifier: WebhookVerifier::new(
            config.webhook.secret.clone(),
            config.webhook.tolerance,
        ),
        tokens: TokenVerifier::new(config.auth_secret.clone()),
    });

    let app = mercato_storefront::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, in-flight requests draining");
}
