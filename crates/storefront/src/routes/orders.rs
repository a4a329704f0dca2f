//! Customer order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::PathRejection},
};

use mercato_core::Order;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::{ListParams, OrderPage, OrderScope};
use crate::state::AppState;

/// List the caller's orders, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    params: std::result::Result<Query<ListParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<OrderPage>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let page = state
        .queries()
        .list_orders(OrderScope::Owner(principal.owner_id), params)
        .await?;
    Ok(Json(page))
}

/// Fetch one of the caller's orders.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(principal): RequireAuth,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Order>> {
    let id = super::order_id(path)?;
    let order = state.queries().get_order(principal.owner_id, id).await?;
    Ok(Json(order))
}
