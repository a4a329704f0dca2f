//! Stripe Checkout client.
//!
//! Sessions are created with a form-encoded POST to `/v1/checkout/sessions`.
//! The order id travels as `client_reference_id` and, together with the
//! owner id, in session metadata so the completion webhook can find the order
//! without a cross-partition scan.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use mercato_core::CurrencyCode;

use super::{
    CheckoutGateway, CheckoutSession, CheckoutSessionRequest, GatewayError, METADATA_ORDER_ID,
    METADATA_OWNER_ID,
};
use crate::config::CheckoutConfig;

const SESSIONS_PATH: &str = "/v1/checkout/sessions";

/// Session object as returned by the provider (fields we read).
#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

/// Provider error envelope.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

/// Stripe Checkout gateway.
#[derive(Clone)]
pub struct StripeCheckoutClient {
    inner: Arc<StripeCheckoutClientInner>,
}

struct StripeCheckoutClientInner {
    client: reqwest::Client,
    endpoint: Url,
    secret_key: SecretString,
    currency: CurrencyCode,
    timeout: Duration,
}

impl StripeCheckoutClient {
    /// Create a new client from checkout configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError` if the HTTP client cannot be built or the API
    /// base URL cannot be joined with the sessions path.
    pub fn new(config: &CheckoutConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let endpoint = config
            .api_base
            .join(SESSIONS_PATH)
            .map_err(|e| GatewayError::Response(format!("invalid API base: {e}")))?;

        Ok(Self {
            inner: Arc::new(StripeCheckoutClientInner {
                client,
                endpoint,
                secret_key: config.secret_key.clone(),
                currency: config.currency,
                timeout: config.timeout,
            }),
        })
    }

    async fn handle_error_status(response: reqwest::Response) -> GatewayError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message.or(e.error.error_type))
            .unwrap_or(body);

        tracing::warn!(status, message = %message, "Checkout provider rejected session");
        GatewayError::Provider { status, message }
    }
}

/// Encode a session request as provider form fields.
fn session_form(request: &CheckoutSessionRequest, currency: CurrencyCode) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_owned(), "payment".to_owned()),
        (
            "client_reference_id".to_owned(),
            request.correlation_id.to_string(),
        ),
        (
            "customer_email".to_owned(),
            request.customer_email.to_string(),
        ),
        ("success_url".to_owned(), request.success_url.to_string()),
        ("cancel_url".to_owned(), request.cancel_url.to_string()),
    ];

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
        form.push((
            format!("{prefix}[price_data][currency]"),
            currency.api_code().to_owned(),
        ));
        form.push((
            format!("{prefix}[price_data][unit_amount]"),
            item.unit_price.minor().to_string(),
        ));
        form.push((
            format!("{prefix}[price_data][product_data][name]"),
            item.name.clone(),
        ));
        if let Some(description) = item.description.as_deref().filter(|d| !d.is_empty()) {
            form.push((
                format!("{prefix}[price_data][product_data][description]"),
                description.to_owned(),
            ));
        }
        for (j, image) in item.images.iter().enumerate() {
            form.push((
                format!("{prefix}[price_data][product_data][images][{j}]"),
                image.clone(),
            ));
        }
    }

    let address = &request.shipping_address;
    let shipping = "payment_intent_data[shipping]";
    form.push((format!("{shipping}[name]"), request.customer_email.to_string()));
    form.push((format!("{shipping}[address][line1]"), address.street.clone()));
    form.push((format!("{shipping}[address][city]"), address.city.clone()));
    form.push((
        format!("{shipping}[address][postal_code]"),
        address.postal_code.clone(),
    ));
    form.push((format!("{shipping}[address][country]"), address.country.clone()));

    for (key, value) in &request.metadata {
        if key == METADATA_ORDER_ID || key == METADATA_OWNER_ID {
            continue;
        }
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    form.push((
        format!("metadata[{METADATA_ORDER_ID}]"),
        request.correlation_id.to_string(),
    ));
    form.push((
        format!("metadata[{METADATA_OWNER_ID}]"),
        request.owner_id.to_string(),
    ));

    form
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutClient {
    #[instrument(skip(self, request), fields(order_id = %request.correlation_id))]
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let form = session_form(request, self.inner.currency);

        let response = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .basic_auth(self.inner.secret_key.expose_secret(), Some(""))
            // A retried call for the same order gets the same session back.
            .header("Idempotency-Key", format!("checkout-{}", request.correlation_id))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.inner.timeout)
                } else {
                    GatewayError::Request(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::handle_error_status(response).await);
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Response(format!("failed to parse session: {e}")))?;
        let redirect_url = session
            .url
            .ok_or_else(|| GatewayError::Response(format!("session {} has no URL", session.id)))?;

        tracing::info!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            session_id: session.id,
            redirect_url,
        })
    }
}
