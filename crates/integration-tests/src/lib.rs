//! Integration test fixtures for Mercato.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests (no services needed)
//! cargo test -p mercato-integration-tests
//!
//! # PostgreSQL-backed tests
//! MERCATO_TEST_DATABASE_URL=postgres://localhost/mercato_test \
//!     cargo test -p mercato-integration-tests -- --ignored
//! ```
//!
//! Everything here wires the real services to the in-memory order store and
//! a scripted checkout gateway, so tests drive the same code the server runs.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::SecretString;
use url::Url;

use mercato_core::{
    AccountRole, LineItem, Money, NewOrder, OrderId, OwnerId, ProductId, ShippingAddress,
};
use mercato_storefront::checkout::{
    CheckoutGateway, CheckoutSession, CheckoutSessionRequest, GatewayError,
};
use mercato_storefront::db::{MemoryAccountDirectory, MemoryOrderStore};
use mercato_storefront::services::CheckoutSettings;
use mercato_storefront::services::auth::Claims;
use mercato_storefront::state::{AppState, StateParts};
use mercato_storefront::webhooks::{WebhookVerifier, sign};

/// Shared HS256 key for bearer tokens in tests.
pub const AUTH_SECRET: &str = "test-auth-key-9f8e7d6c5b4a39281706f5e4d3c2b1a0";

/// Shared webhook signing secret in tests.
pub const WEBHOOK_SECRET: &str = "whsec_integration_5d41402abc4b2a76b9719d911017c592";

/// Signature timestamp tolerance used by [`TestApp`].
pub const WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

/// Checkout gateway with scripted answers.
///
/// Each call pops the next scripted result; once the script is exhausted it
/// answers with `sess_<n>` sessions. Every request is recorded.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<CheckoutSession, GatewayError>>>,
    requests: Mutex<Vec<CheckoutSessionRequest>>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next call with this session id.
    #[must_use]
    pub fn then_session(self, session_id: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(session(session_id)));
        self
    }

    /// Fail the next call with a provider error.
    #[must_use]
    pub fn then_fail(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(GatewayError::Provider {
                status: 503,
                message: "provider unavailable".to_owned(),
            }));
        self
    }

    /// Number of `create_session` calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<CheckoutSessionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn session(session_id: &str) -> CheckoutSession {
    CheckoutSession {
        session_id: session_id.to_owned(),
        redirect_url: format!("https://checkout.example.test/pay/{session_id}"),
    }
}

#[async_trait]
impl CheckoutGateway for ScriptedGateway {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(session(&format!("sess_{n}"))))
    }
}

/// Checkout redirect targets used by tests.
#[must_use]
pub fn checkout_settings() -> CheckoutSettings {
    CheckoutSettings {
        success_url: Url::parse("https://shop.example.test/checkout/success").unwrap(),
        cancel_url: Url::parse("https://shop.example.test/checkout/cancel").unwrap(),
        timeout: Duration::from_secs(5),
    }
}

/// The full application over in-memory collaborators.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryOrderStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub accounts: Arc<MemoryAccountDirectory>,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_gateway(ScriptedGateway::new())
    }

    #[must_use]
    pub fn with_gateway(gateway: ScriptedGateway) -> Self {
        let store = Arc::new(MemoryOrderStore::new());
        let gateway = Arc::new(gateway);
        let accounts = Arc::new(MemoryAccountDirectory::new());

        let state = AppState::new(StateParts {
            store: store.clone(),
            gateway: gateway.clone(),
            accounts: accounts.clone(),
            checkout: checkout_settings(),
            webhook_verifier: WebhookVerifier::new(
                SecretString::from(WEBHOOK_SECRET),
                WEBHOOK_TOLERANCE,
            ),
            tokens: mercato_storefront::services::auth::TokenVerifier::new(SecretString::from(
                AUTH_SECRET,
            )),
        });

        Self {
            state,
            store,
            gateway,
            accounts,
        }
    }

    /// The router with the full middleware stack.
    #[must_use]
    pub fn router(&self) -> Router {
        mercato_storefront::app(self.state.clone())
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a bearer token the way the account service would.
#[must_use]
pub fn bearer(owner_id: OwnerId, role: AccountRole) -> String {
    let claims = Claims {
        sub: owner_id.to_string(),
        role,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(AUTH_SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {token}")
}

/// A one-line cart totalling 49.99.
#[must_use]
pub fn sample_order() -> NewOrder {
    NewOrder {
        items: vec![LineItem {
            product_id: ProductId::generate(),
            name: "Beeswax Candle".to_owned(),
            description: Some("Hand-poured soy wax".to_owned()),
            quantity: 1,
            unit_price: Money::from_minor(4999),
            images: vec![],
        }],
        shipping_address: ShippingAddress {
            street: "1 Harbour Road".to_owned(),
            city: "Lisbon".to_owned(),
            postal_code: "1100-148".to_owned(),
            country: "PT".to_owned(),
        },
        customer_email: "buyer@example.com".to_owned(),
        total: Some(Money::from_minor(4999)),
        metadata: BTreeMap::new(),
    }
}

/// A `checkout.session.completed` body as the provider sends it.
#[must_use]
pub fn completion_event(
    event_id: &str,
    order_id: OrderId,
    owner_id: Option<OwnerId>,
    session_id: &str,
) -> Vec<u8> {
    let mut metadata = serde_json::json!({ "order_id": order_id.to_string() });
    if let Some(owner_id) = owner_id {
        metadata["owner_id"] = serde_json::Value::String(owner_id.to_string());
    }
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "object": "checkout.session",
            "client_reference_id": order_id.to_string(),
            "payment_status": "paid",
            "metadata": metadata,
        }}
    })
    .to_string()
    .into_bytes()
}

/// Signature header for `payload`, signed now with [`WEBHOOK_SECRET`].
#[must_use]
pub fn signature(payload: &[u8]) -> String {
    sign(WEBHOOK_SECRET, payload, chrono::Utc::now().timestamp()).unwrap()
}
