//! Order lifecycle manager.
//!
//! Owns the order state machine: creating pending orders, attaching checkout
//! sessions, confirming payment from verified provider events, and
//! administrative status changes.
//!
//! # Concurrency
//!
//! Every write is a read-modify-write against the store, conditional on the
//! version that was read. On a version conflict the order is re-read and the
//! decision re-made, up to [`MAX_WRITE_ATTEMPTS`] times. Completion events are
//! idempotent: once an order is confirmed (or later), further completion
//! events for it change nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use mercato_core::{
    NewOrder, Order, OrderId, OrderStatus, OwnerId, TransitionError, ValidationErrors,
};

use crate::checkout::{CheckoutGateway, CheckoutSession, CheckoutSessionRequest, GatewayError};
use crate::config::CheckoutConfig;
use crate::db::{OrderStore, StoreError};
use crate::webhooks::{CheckoutEvent, WebhookError};

/// How many times a write path re-reads and retries after a version conflict.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Errors from the order lifecycle.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Input failed validation; carries every violation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// No such order (or not visible to the caller).
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The write clashed with existing state.
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        /// Whether trying again may succeed (lost an optimistic-concurrency race).
        retryable: bool,
    },

    /// The requested status change is not allowed.
    #[error("invalid status transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    /// A webhook failed verification.
    #[error("webhook rejected: {0}")]
    Authentication(WebhookError),

    /// An authentic provider event whose body we cannot read. Redelivery
    /// brings the same bytes, so this is never retried.
    #[error("unreadable provider event: {0}")]
    MalformedEvent(String),

    /// The checkout provider failed; retry `begin_checkout`.
    #[error("checkout gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The order store failed.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<ValidationErrors> for OrderError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<WebhookError> for OrderError {
    fn from(err: WebhookError) -> Self {
        if err.is_authentication() {
            Self::Authentication(err)
        } else {
            Self::MalformedEvent(err.to_string())
        }
    }
}

impl OrderError {
    fn from_store(err: StoreError, id: OrderId) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound(id),
            StoreError::Conflict(message) => Self::Conflict {
                message,
                retryable: false,
            },
            StoreError::VersionConflict { .. } => Self::contention(id),
            other => Self::Store(other),
        }
    }

    fn contention(id: OrderId) -> Self {
        Self::Conflict {
            message: format!("order {id} is being modified concurrently"),
            retryable: true,
        }
    }
}

/// Result of applying a provider event.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The order moved from `pending` to `confirmed`.
    Confirmed(Order),
    /// Payment was already recorded; nothing changed.
    AlreadyApplied(Order),
    /// Not a completion event.
    Ignored,
}

/// Where the provider sends the customer back to, and how long to wait for it.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub success_url: Url,
    pub cancel_url: Url,
    pub timeout: Duration,
}

impl From<&CheckoutConfig> for CheckoutSettings {
    fn from(config: &CheckoutConfig) -> Self {
        Self {
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
            timeout: config.timeout,
        }
    }
}

/// The order lifecycle manager.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn CheckoutGateway>,
    settings: CheckoutSettings,
}

impl OrderService {
    #[must_use]
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn CheckoutGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            settings,
        }
    }

    /// Validate `input` and persist it as a new `pending` order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` with every violated constraint, or
    /// `OrderError::Conflict`/`OrderError::Store` if the insert fails.
    #[instrument(skip(self, input), fields(owner_id = %owner_id))]
    pub async fn create_order(&self, owner_id: OwnerId, input: NewOrder) -> Result<Order, OrderError> {
        let id = OrderId::generate();
        let order = input.into_order(id, owner_id, Utc::now())?;

        let order = self
            .store
            .create(&order)
            .await
            .map_err(|e| OrderError::from_store(e, id))?;

        tracing::info!(order_id = %order.id, total = %order.total, "Order created");
        Ok(order)
    }

    /// Open a checkout session for `order` and record it on the order.
    ///
    /// Idempotent: the order is re-read first, and if it already has a
    /// session that session is returned without calling the provider. If the
    /// provider fails or times out, the order stays `pending` without a
    /// session and the call can simply be repeated.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Gateway` on provider failure or timeout,
    /// `OrderError::Conflict` if the order is no longer `pending`, and
    /// `OrderError::NotFound` if the order disappeared.
    pub async fn begin_checkout(&self, order: &Order) -> Result<CheckoutSession, OrderError> {
        self.resume_checkout(order.owner_id, order.id).await
    }

    /// [`OrderService::begin_checkout`] for an order known only by its key.
    ///
    /// # Errors
    ///
    /// See [`OrderService::begin_checkout`].
    #[instrument(skip(self), fields(order_id = %id, owner_id = %owner_id))]
    pub async fn resume_checkout(
        &self,
        owner_id: OwnerId,
        id: OrderId,
    ) -> Result<CheckoutSession, OrderError> {
        let mut opened: Option<CheckoutSession> = None;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .store
                .get_by_owner_and_id(owner_id, id)
                .await
                .map_err(|e| OrderError::from_store(e, id))?
                .ok_or(OrderError::NotFound(id))?;

            if current.status != OrderStatus::Pending {
                return Err(OrderError::Conflict {
                    message: format!(
                        "order is {}; only pending orders can check out",
                        current.status
                    ),
                    retryable: false,
                });
            }
            if current.has_session() {
                let (Some(session_id), Some(redirect_url)) = (
                    current.external_session_id.clone(),
                    current.checkout_url.clone(),
                ) else {
                    return Err(OrderError::Conflict {
                        message: "order has a checkout session without a redirect".to_owned(),
                        retryable: false,
                    });
                };
                tracing::debug!(session_id = %session_id, "Order already has a checkout session");
                return Ok(CheckoutSession {
                    session_id,
                    redirect_url,
                });
            }

            // A session opened on an earlier attempt is reused, never reopened.
            let session = match &opened {
                Some(session) => session.clone(),
                None => {
                    let session = self.open_session(&current).await?;
                    opened = Some(session.clone());
                    session
                }
            };

            let mut next = current.clone();
            next.external_session_id = Some(session.session_id.clone());
            next.checkout_url = Some(session.redirect_url.clone());
            next.updated_at = Utc::now();

            match self.store.replace(owner_id, id, &next, current.version).await {
                Ok(_) => {
                    tracing::info!(session_id = %session.session_id, "Checkout session attached");
                    return Ok(session);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::debug!(attempt, "Version conflict attaching session, retrying");
                }
                Err(e) => return Err(OrderError::from_store(e, id)),
            }
        }

        Err(OrderError::contention(id))
    }

    async fn open_session(&self, order: &Order) -> Result<CheckoutSession, OrderError> {
        let request = CheckoutSessionRequest {
            correlation_id: order.id,
            owner_id: order.owner_id,
            line_items: order.items.clone(),
            shipping_address: order.shipping_address.clone(),
            customer_email: order.customer_email.clone(),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            metadata: order.metadata.clone(),
        };

        let timeout = self.settings.timeout;
        match tokio::time::timeout(timeout, self.gateway.create_session(&request)).await {
            Ok(Ok(session)) => Ok(session),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Checkout session creation failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(?timeout, "Checkout session creation timed out");
                Err(GatewayError::Timeout(timeout).into())
            }
        }
    }

    /// Apply a verified provider event.
    ///
    /// Only completion events act: the referenced order moves from `pending`
    /// to `confirmed`. Applying the same event again (or any completion event
    /// for an order that is already confirmed or further along) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if the referenced order does not exist.
    /// Callers acknowledge the event anyway; redelivery cannot create it.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, kind = event.kind.as_str()))]
    pub async fn apply_completion_event(
        &self,
        event: &CheckoutEvent,
    ) -> Result<CompletionOutcome, OrderError> {
        if !event.is_completion() {
            tracing::debug!("Ignoring non-completion event");
            return Ok(CompletionOutcome::Ignored);
        }
        let Some(id) = event.correlation_id else {
            return Err(ValidationErrors::single(
                "client_reference_id",
                "completion event does not reference an order",
            )
            .into());
        };

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let order = self.resolve(id, event.owner_hint).await?;

            if order.status.is_payment_settled() {
                tracing::info!(status = %order.status, "Completion already applied");
                return Ok(CompletionOutcome::AlreadyApplied(order));
            }

            let mut next = order.clone();
            next.status = OrderStatus::Confirmed;
            next.updated_at = Utc::now();
            match (&order.external_session_id, &event.session_id) {
                (None, Some(session_id)) => next.external_session_id = Some(session_id.clone()),
                (Some(stored), Some(session_id)) if stored != session_id => {
                    tracing::warn!(
                        stored = %stored,
                        received = %session_id,
                        "Completion event names a different session than the order"
                    );
                }
                _ => {}
            }

            match self
                .store
                .replace(order.owner_id, id, &next, order.version)
                .await
            {
                Ok(saved) => {
                    tracing::info!(order_id = %id, "Order confirmed");
                    return Ok(CompletionOutcome::Confirmed(saved));
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::debug!(attempt, "Version conflict confirming order, retrying");
                }
                Err(e) => return Err(OrderError::from_store(e, id)),
            }
        }

        Err(OrderError::contention(id))
    }

    /// Point lookup when the owner is known, scan otherwise.
    async fn resolve(&self, id: OrderId, owner_hint: Option<OwnerId>) -> Result<Order, OrderError> {
        if let Some(owner_id) = owner_hint
            && let Some(order) = self
                .store
                .get_by_owner_and_id(owner_id, id)
                .await
                .map_err(|e| OrderError::from_store(e, id))?
        {
            return Ok(order);
        }

        self.store
            .get_by_id(id)
            .await
            .map_err(|e| OrderError::from_store(e, id))?
            .ok_or(OrderError::NotFound(id))
    }

    /// Administrative status change.
    ///
    /// `status` must be one of the enumerated status names. Moves must go
    /// forward (or to `cancelled`); terminal orders cannot change. Setting
    /// the current status again returns the order unchanged.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an unknown status name,
    /// `OrderError::NotFound` for an unknown order, and
    /// `OrderError::InvalidTransition` for a disallowed move.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn update_order_status(&self, id: OrderId, status: &str) -> Result<Order, OrderError> {
        let target = status
            .parse::<OrderStatus>()
            .map_err(|msg| ValidationErrors::single("status", msg))?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            // Admins do not know the owner: cross-partition scan.
            let order = self
                .store
                .get_by_id(id)
                .await
                .map_err(|e| OrderError::from_store(e, id))?
                .ok_or(OrderError::NotFound(id))?;

            if !order.status.check_transition(target)? {
                return Ok(order);
            }

            let mut next = order.clone();
            next.status = target;
            next.updated_at = Utc::now();

            match self
                .store
                .replace(order.owner_id, id, &next, order.version)
                .await
            {
                Ok(saved) => {
                    tracing::info!(from = %order.status, to = %target, "Order status updated");
                    return Ok(saved);
                }
                Err(StoreError::VersionConflict { .. }) => {
                    tracing::debug!(attempt, "Version conflict updating status, retrying");
                }
                Err(e) => return Err(OrderError::from_store(e, id)),
            }
        }

        Err(OrderError::contention(id))
    }
}
