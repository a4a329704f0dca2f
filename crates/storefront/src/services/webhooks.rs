//! Webhook intake: verify, de-duplicate, dispatch to the lifecycle manager.
//!
//! Deliveries are at-least-once. Recently processed event ids are remembered
//! in a `moka` cache (24 hour TTL) so re-deliveries skip the store entirely;
//! the lifecycle manager's own idempotency still holds when the cache misses.

use std::time::Duration;

use moka::future::Cache;
use tracing::instrument;

use mercato_core::OrderId;

use super::orders::{CompletionOutcome, OrderError, OrderService};
use crate::webhooks::{SIGNATURE_HEADER, WebhookError, WebhookVerifier};

const PROCESSED_EVENTS_CAPACITY: u64 = 10_000;
const PROCESSED_EVENTS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What happened to an authentic delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The event was applied (or recognised as already applied, or ignored).
    Processed(CompletionOutcome),
    /// This event id was processed recently.
    Duplicate,
    /// The event names an order that does not exist. Acknowledged anyway.
    UnknownOrder(OrderId),
}

#[derive(Clone)]
pub struct WebhookService {
    verifier: WebhookVerifier,
    orders: OrderService,
    processed: Cache<String, ()>,
}

impl WebhookService {
    #[must_use]
    pub fn new(verifier: WebhookVerifier, orders: OrderService) -> Self {
        let processed = Cache::builder()
            .max_capacity(PROCESSED_EVENTS_CAPACITY)
            .time_to_live(PROCESSED_EVENTS_TTL)
            .build();

        Self {
            verifier,
            orders,
            processed,
        }
    }

    /// Handle one delivery: `payload` is the raw request body.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Authentication` if the signature is missing or
    /// wrong, `OrderError::MalformedEvent` if an authentic body is unreadable,
    /// and propagates store failures so the provider redelivers.
    #[instrument(skip(self, payload, signature), fields(bytes = payload.len()))]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, OrderError> {
        let signature = signature.ok_or(WebhookError::MissingHeader(SIGNATURE_HEADER))?;
        let event = match self.verifier.verify(payload, signature) {
            Ok(event) => event,
            Err(e) if e.is_authentication() => return Err(OrderError::Authentication(e)),
            Err(e) => {
                tracing::error!(error = %e, "Authentic webhook with unreadable payload");
                return Err(e.into());
            }
        };

        if self.processed.contains_key(&event.event_id) {
            tracing::info!(event_id = %event.event_id, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        match self.orders.apply_completion_event(&event).await {
            Ok(outcome) => {
                self.processed.insert(event.event_id.clone(), ()).await;
                Ok(WebhookOutcome::Processed(outcome))
            }
            Err(OrderError::NotFound(id)) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    order_id = %id,
                    "Completion event for unknown order, acknowledging"
                );
                self.processed.insert(event.event_id.clone(), ()).await;
                Ok(WebhookOutcome::UnknownOrder(id))
            }
            Err(e) => Err(e),
        }
    }
}
