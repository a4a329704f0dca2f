//! `PostgreSQL` order store.
//!
//! Queries are built at runtime with `sqlx::query_as` so the crate compiles
//! without a live database.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use mercato_core::{
    Email, LineItem, Money, Order, OrderId, OrderStatus, OwnerId, ShippingAddress,
};

use super::{OrderFilter, OrderStore, Pagination, StoreError};

const ORDER_COLUMNS: &str = "owner_id, id, items, shipping_address, status, total_minor, \
     customer_email, external_session_id, checkout_url, metadata, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    owner_id: Uuid,
    id: Uuid,
    items: Json<Vec<LineItem>>,
    shipping_address: Json<ShippingAddress>,
    status: String,
    total_minor: i64,
    customer_email: String,
    external_session_id: Option<String>,
    checkout_url: Option<String>,
    metadata: Json<BTreeMap<String, String>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OrderStatus>().map_err(|e| {
            StoreError::DataCorruption(format!("invalid status for order {}: {e}", row.id))
        })?;
        let customer_email = Email::parse(&row.customer_email).map_err(|e| {
            StoreError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            owner_id: OwnerId::new(row.owner_id),
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            status,
            total: Money::from_minor(row.total_minor),
            external_session_id: row.external_session_id,
            checkout_url: row.checkout_url,
            customer_email,
            metadata: row.metadata.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Map unique violations onto `StoreError::Conflict`.
fn map_write_error(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(format!("{what} already exists"));
    }
    StoreError::Database(e)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Order store backed by the `mercato.orders` table.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, order: &Order) -> Result<Order, StoreError> {
        let sql = format!(
            r"
            INSERT INTO mercato.orders ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row: OrderRow = sqlx::query_as(&sql)
            .bind(order.owner_id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(Json(&order.items))
            .bind(Json(&order.shipping_address))
            .bind(order.status.as_str())
            .bind(order.total.minor())
            .bind(order.customer_email.as_str())
            .bind(order.external_session_id.as_deref())
            .bind(order.checkout_url.as_deref())
            .bind(Json(&order.metadata))
            .bind(order.version)
            .bind(order.created_at)
            .bind(order.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "order"))?;

        row.try_into()
    }

    async fn get_by_owner_and_id(
        &self,
        owner_id: OwnerId,
        id: OrderId,
    ) -> Result<Option<Order>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM mercato.orders WHERE owner_id = $1 AND id = $2"
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(owner_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        // Not partition-keyed; served by the unique `orders_id_idx` across owners.
        let sql = format!("SELECT {ORDER_COLUMNS} FROM mercato.orders WHERE id = $1");
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn replace(
        &self,
        owner_id: OwnerId,
        id: OrderId,
        order: &Order,
        expected_version: i64,
    ) -> Result<Order, StoreError> {
        let sql = format!(
            r"
            UPDATE mercato.orders
            SET items = $4,
                shipping_address = $5,
                status = $6,
                total_minor = $7,
                customer_email = $8,
                external_session_id = $9,
                checkout_url = $10,
                metadata = $11,
                updated_at = $12,
                version = version + 1
            WHERE owner_id = $1 AND id = $2 AND version = $3
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row: Option<OrderRow> = sqlx::query_as(&sql)
            .bind(owner_id.as_uuid())
            .bind(id.as_uuid())
            .bind(expected_version)
            .bind(Json(&order.items))
            .bind(Json(&order.shipping_address))
            .bind(order.status.as_str())
            .bind(order.total.minor())
            .bind(order.customer_email.as_str())
            .bind(order.external_session_id.as_deref())
            .bind(order.checkout_url.as_deref())
            .bind(Json(&order.metadata))
            .bind(order.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "external session id"))?;

        if let Some(row) = row {
            return row.try_into();
        }

        // Nothing matched: either the order is missing or its version moved on.
        let actual: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM mercato.orders WHERE owner_id = $1 AND id = $2",
        )
        .bind(owner_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match actual {
            Some(actual) => Err(StoreError::VersionConflict {
                expected: expected_version,
                actual,
            }),
            None => Err(StoreError::NotFound),
        }
    }

    async fn query(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<(Vec<Order>, u64), StoreError> {
        const WHERE: &str = r"
            WHERE ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL
                   OR strpos(lower(COALESCE(metadata->>'reference', '')), lower($3)) > 0)
        ";

        let owner = filter.owner_id.map(|o| o.as_uuid());
        let status = filter.status.map(|s| s.as_str());
        let reference = filter.reference.as_deref();

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM mercato.orders {WHERE}"))
            .bind(owner)
            .bind(status)
            .bind(reference)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM mercato.orders {WHERE} \
             ORDER BY created_at DESC, id DESC OFFSET $4 LIMIT $5"
        );
        let rows: Vec<OrderRow> = sqlx::query_as(&sql)
            .bind(owner)
            .bind(status)
            .bind(reference)
            .bind(to_i64(page.offset))
            .bind(to_i64(page.limit))
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((orders, u64::try_from(total).unwrap_or_default()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
