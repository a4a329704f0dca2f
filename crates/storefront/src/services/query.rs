//! Order query service: read-side listing and lookup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use mercato_core::{Order, OrderId, OrderStatus, OwnerId, ValidationErrors};

use super::orders::OrderError;
use crate::db::{AccountDirectory, AccountSummary, OrderFilter, OrderStore, Pagination};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

/// Whose orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// One customer's orders.
    Owner(OwnerId),
    /// Every owner (administrative).
    All,
}

/// Listing parameters, as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    /// Free-text match against the order reference.
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// One page of orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u64,
    pub limit: u64,
    /// Number of matching orders across all pages.
    pub total: u64,
}

/// An order together with the redacted owner account.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderView {
    pub order: Order,
    pub owner: Option<AccountSummary>,
}

#[derive(Clone)]
pub struct OrderQueryService {
    store: Arc<dyn OrderStore>,
    accounts: Arc<dyn AccountDirectory>,
}

impl OrderQueryService {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, accounts: Arc<dyn AccountDirectory>) -> Self {
        Self { store, accounts }
    }

    /// List orders newest first.
    ///
    /// An empty page is not an error.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an unknown status, `page < 1`,
    /// or a limit outside `1..=100`; `OrderError::Store` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        scope: OrderScope,
        params: ListParams,
    ) -> Result<OrderPage, OrderError> {
        let mut errors = ValidationErrors::new();

        let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => match raw.parse::<OrderStatus>() {
                Ok(status) => Some(status),
                Err(msg) => {
                    errors.push("status", msg);
                    None
                }
            },
            None => None,
        };
        let page = params.page.unwrap_or(DEFAULT_PAGE);
        if page < 1 {
            errors.push("page", "must be at least 1");
        }
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            errors.push("limit", format!("must be between 1 and {MAX_LIMIT}"));
        }
        errors.into_result(())?;

        let filter = OrderFilter {
            owner_id: match scope {
                OrderScope::Owner(owner_id) => Some(owner_id),
                OrderScope::All => None,
            },
            status,
            reference: params
                .q
                .map(|q| q.trim().to_owned())
                .filter(|q| !q.is_empty()),
        };
        let window = Pagination {
            offset: (page - 1).saturating_mul(limit),
            limit,
        };

        let (orders, total) = self
            .store
            .query(&filter, window)
            .await
            .map_err(OrderError::Store)?;

        Ok(OrderPage {
            orders,
            page,
            limit,
            total,
        })
    }

    /// Owner-scoped fetch. Orders belonging to someone else are reported as
    /// not found.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Store`.
    pub async fn get_order(&self, owner_id: OwnerId, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_by_owner_and_id(owner_id, id)
            .await
            .map_err(OrderError::Store)?
            .ok_or(OrderError::NotFound(id))
    }

    /// Administrative fetch by id across every owner, with the owner summary.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` or `OrderError::Store`.
    #[instrument(skip(self))]
    pub async fn admin_order(&self, id: OrderId) -> Result<AdminOrderView, OrderError> {
        let order = self
            .store
            .get_by_id(id)
            .await
            .map_err(OrderError::Store)?
            .ok_or(OrderError::NotFound(id))?;

        let owner = match self.accounts.account_summary(order.owner_id).await {
            Ok(owner) => owner,
            Err(e) => {
                // The order is still worth showing without its owner.
                tracing::warn!(error = %e, owner_id = %order.owner_id, "Account lookup failed");
                None
            }
        };

        Ok(AdminOrderView { order, owner })
    }
}
