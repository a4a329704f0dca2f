//! Inbound checkout provider webhooks.
//!
//! The provider signs every delivery. [`WebhookVerifier`] checks the signature
//! over the exact bytes received and only then parses them into a
//! [`CheckoutEvent`].

mod verifier;

use mercato_core::{OrderId, OwnerId};
use thiserror::Error;

pub use verifier::{SIGNATURE_HEADER, WebhookVerifier, sign};

/// Event type emitted when a hosted checkout is paid.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Reasons an inbound webhook is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header is absent.
    #[error("missing {0} header")]
    MissingHeader(&'static str),

    /// The signature header could not be parsed.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    /// No signature in the header matches the payload.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The signed timestamp is outside the tolerance window.
    #[error("timestamp outside tolerance ({age_secs}s old)")]
    StaleTimestamp {
        /// Distance between the signed timestamp and now.
        age_secs: i64,
    },

    /// The payload is authentic but not an event we can read.
    #[error("malformed event payload: {0}")]
    MalformedPayload(String),
}

impl WebhookError {
    /// Whether this is an authentication failure (as opposed to an
    /// authentic payload we cannot read).
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        !matches!(self, Self::MalformedPayload(_))
    }
}

/// Kind of a provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Payment for a checkout session completed.
    CheckoutSessionCompleted,
    /// Anything else in the provider's catalog; acknowledged and ignored.
    Other(String),
}

impl EventKind {
    fn from_type(kind: &str) -> Self {
        if kind == CHECKOUT_COMPLETED {
            Self::CheckoutSessionCompleted
        } else {
            Self::Other(kind.to_owned())
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => CHECKOUT_COMPLETED,
            Self::Other(kind) => kind,
        }
    }
}

/// A verified provider event.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutEvent {
    /// Provider's event id; identical across re-deliveries.
    pub event_id: String,
    pub kind: EventKind,
    /// Order the session was opened for.
    pub correlation_id: Option<OrderId>,
    /// Checkout session the event refers to.
    pub session_id: Option<String>,
    /// Owner partition, when the session metadata carries it.
    pub owner_hint: Option<OwnerId>,
    /// The full event body.
    pub raw: serde_json::Value,
}

impl CheckoutEvent {
    /// Parse an (already authenticated) event body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedPayload` if the body is not a JSON
    /// event, or if a completion event does not name a valid order.
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        let raw: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;

        let text = |pointer: &str| raw.pointer(pointer).and_then(serde_json::Value::as_str);

        let event_id = text("/id")
            .ok_or_else(|| WebhookError::MalformedPayload("event has no id".to_owned()))?
            .to_owned();
        let kind = EventKind::from_type(
            text("/type")
                .ok_or_else(|| WebhookError::MalformedPayload("event has no type".to_owned()))?,
        );

        let reference = text("/data/object/client_reference_id")
            .or_else(|| text("/data/object/metadata/order_id"));
        let correlation_id = match reference.map(str::parse::<OrderId>) {
            Some(Ok(id)) => Some(id),
            Some(Err(e)) if kind == EventKind::CheckoutSessionCompleted => {
                return Err(WebhookError::MalformedPayload(format!(
                    "invalid order reference: {e}"
                )));
            }
            _ => None,
        };
        if kind == EventKind::CheckoutSessionCompleted && correlation_id.is_none() {
            return Err(WebhookError::MalformedPayload(
                "completion event does not reference an order".to_owned(),
            ));
        }

        let session_id = text("/data/object/id").map(str::to_owned);
        let owner_hint = text("/data/object/metadata/owner_id").and_then(|s| s.parse().ok());

        Ok(Self {
            event_id,
            kind,
            correlation_id,
            session_id,
            owner_hint,
            raw,
        })
    }

    #[must_use]
    pub fn is_completion(&self) -> bool {
        self.kind == EventKind::CheckoutSessionCompleted
    }
}
