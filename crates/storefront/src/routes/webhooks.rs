//! Checkout provider webhook handler.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde_json::{Value, json};

use crate::error::Result;
use crate::services::WebhookOutcome;
use crate::state::AppState;
use crate::webhooks::SIGNATURE_HEADER;

/// Receive a signed provider event.
///
/// The body is taken as raw bytes: the signature covers the exact payload,
/// so nothing may parse it before verification.
pub async fn checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.webhooks().handle(&body, signature).await?;
    let duplicate = matches!(outcome, WebhookOutcome::Duplicate);

    Ok(Json(json!({ "received": true, "duplicate": duplicate })))
}
