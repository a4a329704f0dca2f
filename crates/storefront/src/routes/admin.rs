//! Administrative order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection, rejection::PathRejection},
};
use serde::Deserialize;

use mercato_core::Order;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::{AdminOrderView, ListParams, OrderPage, OrderScope};
use crate::state::AppState;

/// Body of `PUT /api/admin/orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

/// List every order, newest first.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    params: std::result::Result<Query<ListParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<OrderPage>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(
        state.queries().list_orders(OrderScope::All, params).await?,
    ))
}

/// Fetch any order with its owner's account summary.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<AdminOrderView>> {
    let id = super::order_id(path)?;
    Ok(Json(state.queries().admin_order(id).await?))
}

/// Move an order forward through fulfillment.
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    path: std::result::Result<Path<String>, PathRejection>,
    payload: std::result::Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Order>> {
    let id = super::order_id(path)?;
    let Json(update) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let order = state
        .orders()
        .update_order_status(id, &update.status)
        .await?;
    tracing::info!(
        order_id = %id,
        admin_id = %admin.owner_id,
        status = %order.status,
        "Admin updated order status"
    );
    Ok(Json(order))
}
