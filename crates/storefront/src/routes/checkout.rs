//! Checkout route handlers.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection, rejection::PathRejection},
    http::StatusCode,
};
use serde::Serialize;

use mercato_core::{NewOrder, OrderId};

use crate::checkout::CheckoutSession;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// Where to send the customer to pay.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub reference: String,
    pub session_id: String,
    pub redirect_url: String,
}

impl CheckoutResponse {
    fn new(order_id: OrderId, session: CheckoutSession) -> Self {
        Self {
            order_id,
            reference: order_id.reference(),
            session_id: session.session_id,
            redirect_url: session.redirect_url,
        }
    }
}

/// Create an order from the submitted cart and open a checkout session.
///
/// If the provider fails the order still exists (pending, no session); the
/// error body carries `retryable: true` and the client retries with
/// `POST /api/orders/{id}/checkout`.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    payload: std::result::Result<Json<NewOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let order = state.orders().create_order(principal.owner_id, input).await?;
    let session = state.orders().begin_checkout(&order).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse::new(order.id, session)),
    ))
}

/// Retry opening a session for an existing pending order.
pub async fn retry(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<CheckoutResponse>> {
    let id = super::order_id(path)?;
    let session = state
        .orders()
        .resume_checkout(principal.owner_id, id)
        .await?;
    Ok(Json(CheckoutResponse::new(id, session)))
}
