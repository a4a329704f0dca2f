//! Hosted checkout session gateway.
//!
//! The storefront never handles card data. It asks the provider for a hosted
//! payment session, redirects the customer there, and later learns the
//! outcome from a signed webhook (see [`crate::webhooks`]).

pub mod stripe;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use mercato_core::{Email, LineItem, OrderId, OwnerId, ShippingAddress};
use thiserror::Error;
use url::Url;

pub use stripe::StripeCheckoutClient;

/// Session metadata key carrying the order id.
pub const METADATA_ORDER_ID: &str = "order_id";
/// Session metadata key carrying the owner (partition) id.
pub const METADATA_OWNER_ID: &str = "owner_id";

/// Errors from the checkout provider. All of them are retryable from the
/// caller's point of view.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider did not answer in time.
    #[error("checkout provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider rejected the request.
    #[error("provider error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider's error message.
        message: String,
    },

    /// The provider answered with something we could not use.
    #[error("unexpected provider response: {0}")]
    Response(String),
}

/// Everything the provider needs to open a payment session for one order.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    /// Echoed back on completion events as the correlation id.
    pub correlation_id: OrderId,
    pub owner_id: OwnerId,
    pub line_items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub customer_email: Email,
    pub success_url: Url,
    pub cancel_url: Url,
    /// Extra key/value pairs attached to the session.
    pub metadata: BTreeMap<String, String>,
}

/// A session the provider has opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    /// Hosted payment page to send the customer to.
    pub redirect_url: String,
}

/// Adapter to a hosted-payment-session provider.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Open a new hosted payment session.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` on any transport or provider failure.
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError>;
}
