//! Application state shared across handlers.

use std::sync::Arc;

use crate::checkout::CheckoutGateway;
use crate::db::{AccountDirectory, OrderStore};
use crate::services::auth::TokenVerifier;
use crate::services::{CheckoutSettings, OrderQueryService, OrderService, WebhookService};
use crate::webhooks::WebhookVerifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The store, gateway and
/// account directory are trait objects so tests can run the full router
/// against in-memory implementations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn OrderStore>,
    orders: OrderService,
    queries: OrderQueryService,
    webhooks: WebhookService,
    tokens: TokenVerifier,
}

/// Everything [`AppState::new`] wires together.
pub struct StateParts {
    pub store: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn CheckoutGateway>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub checkout: CheckoutSettings,
    pub webhook_verifier: WebhookVerifier,
    pub tokens: TokenVerifier,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(parts: StateParts) -> Self {
        let orders = OrderService::new(
            Arc::clone(&parts.store),
            parts.gateway,
            parts.checkout,
        );
        let queries = OrderQueryService::new(Arc::clone(&parts.store), parts.accounts);
        let webhooks = WebhookService::new(parts.webhook_verifier, orders.clone());

        Self {
            inner: Arc::new(AppStateInner {
                store: parts.store,
                orders,
                queries,
                webhooks,
                tokens: parts.tokens,
            }),
        }
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.inner.store
    }

    /// Get a reference to the order lifecycle manager.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// Get a reference to the order query service.
    #[must_use]
    pub fn queries(&self) -> &OrderQueryService {
        &self.inner.queries
    }

    /// Get a reference to the webhook intake service.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookService {
        &self.inner.webhooks
    }

    /// Get a reference to the bearer token verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenVerifier {
        &self.inner.tokens
    }
}
