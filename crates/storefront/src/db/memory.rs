//! In-process order store.
//!
//! Mirrors the partitioned layout of the `PostgreSQL` store: one map per
//! owner, and `get_by_id` really does walk every partition. Used by tests and
//! local development.

use std::collections::HashMap;

use async_trait::async_trait;
use mercato_core::{Order, OrderId, OwnerId};
use tokio::sync::RwLock;

use super::{OrderFilter, OrderStore, Pagination, StoreError};

type Partitions = HashMap<OwnerId, HashMap<OrderId, Order>>;

/// Order store backed by a lock-guarded map of owner partitions.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    partitions: RwLock<Partitions>,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders across every partition.
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn session_taken(partitions: &Partitions, session_id: &str, except: OrderId) -> bool {
    partitions
        .values()
        .flat_map(HashMap::values)
        .any(|o| o.id != except && o.external_session_id.as_deref() == Some(session_id))
}

fn matches(order: &Order, filter: &OrderFilter) -> bool {
    filter.status.is_none_or(|status| order.status == status)
        && filter
            .reference
            .as_deref()
            .is_none_or(|needle| order.reference_matches(needle))
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, StoreError> {
        let mut partitions = self.partitions.write().await;

        if partitions.values().any(|p| p.contains_key(&order.id)) {
            return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
        }
        if let Some(session_id) = order.external_session_id.as_deref()
            && session_taken(&partitions, session_id, order.id)
        {
            return Err(StoreError::Conflict(format!(
                "session {session_id} already belongs to another order"
            )));
        }

        partitions
            .entry(order.owner_id)
            .or_default()
            .insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn get_by_owner_and_id(
        &self,
        owner_id: OwnerId,
        id: OrderId,
    ) -> Result<Option<Order>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&owner_id)
            .and_then(|p| p.get(&id))
            .cloned())
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let partitions = self.partitions.read().await;
        Ok(partitions.values().find_map(|p| p.get(&id)).cloned())
    }

    async fn replace(
        &self,
        owner_id: OwnerId,
        id: OrderId,
        order: &Order,
        expected_version: i64,
    ) -> Result<Order, StoreError> {
        let mut partitions = self.partitions.write().await;

        let actual = partitions
            .get(&owner_id)
            .and_then(|p| p.get(&id))
            .map(|stored| stored.version)
            .ok_or(StoreError::NotFound)?;
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            });
        }
        if let Some(session_id) = order.external_session_id.as_deref()
            && session_taken(&partitions, session_id, id)
        {
            return Err(StoreError::Conflict(format!(
                "session {session_id} already belongs to another order"
            )));
        }

        let mut updated = order.clone();
        updated.id = id;
        updated.owner_id = owner_id;
        updated.version = expected_version + 1;

        let slot = partitions
            .get_mut(&owner_id)
            .and_then(|p| p.get_mut(&id))
            .ok_or(StoreError::NotFound)?;
        *slot = updated.clone();
        Ok(updated)
    }

    async fn query(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        let partitions = self.partitions.read().await;

        let mut found: Vec<&Order> = match filter.owner_id {
            Some(owner_id) => partitions
                .get(&owner_id)
                .map(|p| p.values().filter(|o| matches(o, filter)).collect())
                .unwrap_or_default(),
            None => partitions
                .values()
                .flat_map(HashMap::values)
                .filter(|o| matches(o, filter))
                .collect(),
        };
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = found.len() as u64;
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        let orders = found
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((orders, total))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
