//! Mercato storefront library.
//!
//! Order lifecycle, checkout session and payment confirmation API. The
//! binary in `main.rs` wires this library to `PostgreSQL` and the checkout
//! provider; the integration tests wire it to in-memory fakes.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod webhooks;

use axum::{Router, middleware::from_fn};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router with its middleware stack.
///
/// Sentry layers are added by the binary; everything else a request passes
/// through is here so tests exercise the same stack.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    owner_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
