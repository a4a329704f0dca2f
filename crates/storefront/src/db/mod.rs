//! Order persistence.
//!
//! # Database: `mercato`
//!
//! ## Tables
//!
//! - `orders` - Order documents, partitioned by `owner_id`
//! - `accounts` - Read-only account directory (owned by the account service)
//!
//! # Partitioning
//!
//! Orders are keyed by `(owner_id, id)`. Lookups that know the owner use the
//! point path ([`OrderStore::get_by_owner_and_id`]); administrative paths that
//! only know the order id use [`OrderStore::get_by_id`], a cross-partition
//! lookup. Order ids are unique across owners.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p mercato-cli -- migrate
//! ```

pub mod accounts;
pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use mercato_core::{Order, OrderId, OrderStatus, OwnerId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use accounts::{AccountDirectory, AccountSummary, MemoryAccountDirectory, PgAccountDirectory};
pub use memory::MemoryOrderStore;
pub use postgres::PgOrderStore;

/// Errors from the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order exists at the given key.
    #[error("not found")]
    NotFound,

    /// An order with this id (or external session id) already exists.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The stored version no longer matches the caller's copy.
    #[error("version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// Version the caller read.
        expected: i64,
        /// Version currently stored.
        actual: i64,
    },

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Read-side filter for [`OrderStore::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Restrict to one owner's partition. `None` scans every owner.
    pub owner_id: Option<OwnerId>,
    pub status: Option<OrderStatus>,
    /// Case-insensitive containment match against the order reference.
    pub reference: Option<String>,
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

/// Persistence contract for order documents.
///
/// Every mutation goes through [`OrderStore::replace`], which is conditional
/// on the version the caller read.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the id is already taken.
    async fn create(&self, order: &Order) -> Result<Order, StoreError>;

    /// Point lookup inside the owner's partition.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` or `StoreError::DataCorruption`.
    async fn get_by_owner_and_id(
        &self,
        owner_id: OwnerId,
        id: OrderId,
    ) -> Result<Option<Order>, StoreError>;

    /// Cross-partition scan by order id. Meant for low-volume administrative
    /// and webhook paths that do not know the owner.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` or `StoreError::DataCorruption`.
    async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Overwrite an existing order if its stored version is `expected_version`.
    ///
    /// The returned order carries the new version (`expected_version + 1`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing is stored at `(owner_id, id)`,
    /// `StoreError::VersionConflict` if another write got there first, and
    /// `StoreError::Conflict` if the session id is already owned by another order.
    async fn replace(
        &self,
        owner_id: OwnerId,
        id: OrderId,
        order: &Order,
        expected_version: i64,
    ) -> Result<Order, StoreError>;

    /// Filtered listing, newest first, plus the total number of matches.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` or `StoreError::DataCorruption`.
    async fn query(
        &self,
        filter: &OrderFilter,
        page: Pagination,
    ) -> Result<(Vec<Order>, u64), StoreError>;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if it is not.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
