//! Binding Store
//!
//! Owns the pool and hands out transaction scopes for the binding protocol.

use anyhow::Result;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{AccountBinding, AccountId};
use super::queries;

/// Persistent store for bindings and permission levels.
///
/// Cloning is cheap and shares the underlying pool. Outside this crate the
/// store is read-only; bindings change through the binding service alone.
///
/// ```compile_fail
/// # async fn rebind(store: wl_bridge::db::Store) {
/// let _tx = store.begin().await;
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open the database at `database_url` and apply migrations.
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = super::create_pool(database_url).await?;
        super::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Open a fresh, migrated in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = super::create_memory_pool().await?;
        super::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Underlying pool, for queries outside a binding transaction.
    #[must_use]
    pub(crate) const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection. Outstanding clones become unusable.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }

    /// Open a transaction scope over the binding relation.
    ///
    /// The write lock is taken up front, so other writers wait for the scope
    /// to end instead of invalidating its snapshot while side effects run.
    pub(crate) async fn begin(&self) -> sqlx::Result<BindingTx> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await.map_err(|e| {
            tracing::error!(error = %e, "Failed to start binding transaction");
            e
        })?;
        Ok(BindingTx { tx })
    }

    /// Current binding of an account, read outside any transaction.
    pub async fn find_binding(&self, account_id: AccountId) -> sqlx::Result<Option<AccountBinding>> {
        queries::find_binding_by_account(&self.pool, account_id).await
    }

    /// Number of stored bindings.
    pub async fn count_bindings(&self) -> sqlx::Result<i64> {
        queries::count_bindings(&self.pool).await
    }
}

/// An open, write-locked transaction over the binding relation.
///
/// Dropping it without [`commit`](Self::commit) rolls every write back.
pub(crate) struct BindingTx {
    tx: Transaction<'static, Sqlite>,
}

impl BindingTx {
    /// Binding that currently owns `game_uuid`.
    pub(crate) async fn owner_of(&mut self, game_uuid: Uuid) -> sqlx::Result<Option<AccountBinding>> {
        queries::find_binding_by_uuid(&mut *self.tx, game_uuid).await
    }

    /// Binding currently held by `account_id`.
    pub(crate) async fn binding_of(
        &mut self,
        account_id: AccountId,
    ) -> sqlx::Result<Option<AccountBinding>> {
        queries::find_binding_by_account(&mut *self.tx, account_id).await
    }

    pub(crate) async fn insert_binding(&mut self, account_id: AccountId, game_uuid: Uuid) -> sqlx::Result<()> {
        queries::insert_binding(&mut *self.tx, account_id, game_uuid).await
    }

    pub(crate) async fn update_binding(&mut self, account_id: AccountId, game_uuid: Uuid) -> sqlx::Result<bool> {
        queries::update_binding(&mut *self.tx, account_id, game_uuid).await
    }

    pub(crate) async fn delete_binding(&mut self, account_id: AccountId) -> sqlx::Result<bool> {
        queries::delete_binding(&mut *self.tx, account_id).await
    }

    /// Make every write in this scope durable.
    pub(crate) async fn commit(self) -> sqlx::Result<()> {
        self.tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to commit binding transaction");
            e
        })
    }

    /// Undo every write in this scope.
    ///
    /// A failed explicit rollback is logged; the connection still discards the
    /// transaction when it is returned to the pool.
    pub(crate) async fn rollback(self) {
        if let Err(e) = self.tx.rollback().await {
            warn!(error = %e, "Explicit rollback failed, relying on implicit rollback");
        }
    }
}
