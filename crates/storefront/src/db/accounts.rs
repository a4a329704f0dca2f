//! Read-only view of the account directory.
//!
//! Accounts are owned by a separate service. The storefront only needs the
//! redacted summary shown next to an order in the admin API.

use std::collections::HashMap;

use async_trait::async_trait;
use mercato_core::OwnerId;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::StoreError;

/// Redacted account view: no credentials, tokens or addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: OwnerId,
    pub email: String,
    pub display_name: Option<String>,
}

/// Lookup of account summaries by owner id.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the lookup fails.
    async fn account_summary(&self, owner_id: OwnerId)
    -> Result<Option<AccountSummary>, StoreError>;
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    display_name: Option<String>,
}

/// Account directory backed by `mercato.accounts`.
#[derive(Debug, Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn account_summary(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<AccountSummary>, StoreError> {
        let row: Option<AccountRow> = sqlx::query_as(
            "SELECT id, email, display_name FROM mercato.accounts WHERE id = $1",
        )
        .bind(owner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AccountSummary {
            id: OwnerId::new(r.id),
            email: r.email,
            display_name: r.display_name,
        }))
    }
}

/// In-process account directory for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryAccountDirectory {
    accounts: RwLock<HashMap<OwnerId, AccountSummary>>,
}

impl MemoryAccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, summary: AccountSummary) {
        self.accounts.write().await.insert(summary.id, summary);
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn account_summary(
        &self,
        owner_id: OwnerId,
    ) -> Result<Option<AccountSummary>, StoreError> {
        Ok(self.accounts.read().await.get(&owner_id).cloned())
    }
}
