//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Liveness
//! GET  /health/ready                 - Readiness (store reachable)
//!
//! # Checkout (requires auth)
//! POST /api/checkout                 - Create an order and open a checkout session
//! POST /api/orders/{id}/checkout     - Retry opening a session for a pending order
//!
//! # Orders (requires auth)
//! GET  /api/orders                   - Caller's orders (?status=&q=&page=&limit=)
//! GET  /api/orders/{id}              - One of the caller's orders
//!
//! # Admin (requires admin role)
//! GET  /api/admin/orders             - Every order
//! GET  /api/admin/orders/{id}        - Order with owner summary
//! PUT  /api/admin/orders/{id}/status - Advance fulfillment status
//!
//! # Provider
//! POST /webhooks/checkout            - Signed checkout provider events
//! ```

pub mod admin;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::{
    Router,
    extract::{Path, rejection::PathRejection},
    routing::{get, post, put},
};

use mercato_core::OrderId;

use crate::error::AppError;
use crate::state::AppState;

/// Parse an `{id}` path segment, answering 404 for anything that is not an
/// order id.
pub(crate) fn order_id(path: Result<Path<String>, PathRejection>) -> Result<OrderId, AppError> {
    let Path(raw) = path.map_err(|e| AppError::BadRequest(e.body_text()))?;
    raw.parse::<OrderId>()
        .map_err(|_| AppError::NotFound(format!("order {raw}")))
}

/// Create the customer order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/checkout", post(checkout::retry))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::index))
        .route("/orders/{id}", get(admin::show))
        .route("/orders/{id}/status", put(admin::update_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/api/checkout", post(checkout::create))
        .nest("/api/orders", order_routes())
        .nest("/api/admin", admin_routes())
        .route("/webhooks/checkout", post(webhooks::checkout))
}
