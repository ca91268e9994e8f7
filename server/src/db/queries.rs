//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! Every function takes any `SQLite` executor, so the same query runs against
//! the pool or inside an open transaction (`&mut *tx`).
//!
//! All query functions include error context logging to aid debugging.

use chrono::Utc;
use sqlx::SqliteExecutor;
use tracing::error;
use uuid::Uuid;

use super::models::{AccountBinding, AccountId};

/// Log and return a database error with context.
macro_rules! db_error {
    ($query:expr, $($field:tt)*) => {
        |e| {
            error!(query = $query, $($field)*, error = %e, "Database query failed");
            e
        }
    };
}

// ============================================================================
// Binding Queries
// ============================================================================

/// Find the binding held by a chat account.
pub async fn find_binding_by_account<'e, E>(
    executor: E,
    account_id: AccountId,
) -> sqlx::Result<Option<AccountBinding>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, AccountBinding>(
        "SELECT account_id, game_uuid, updated_at FROM account_bindings WHERE account_id = ?",
    )
    .bind(account_id)
    .fetch_optional(executor)
    .await
    .map_err(db_error!("find_binding_by_account", account_id))
}

/// Find the binding that owns a game UUID.
pub async fn find_binding_by_uuid<'e, E>(
    executor: E,
    game_uuid: Uuid,
) -> sqlx::Result<Option<AccountBinding>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, AccountBinding>(
        "SELECT account_id, game_uuid, updated_at FROM account_bindings WHERE game_uuid = ?",
    )
    .bind(game_uuid)
    .fetch_optional(executor)
    .await
    .map_err(db_error!("find_binding_by_uuid", game_uuid = %game_uuid))
}

/// Insert a new binding.
///
/// Fails with a unique violation if the UUID is already bound.
pub async fn insert_binding<'e, E>(
    executor: E,
    account_id: AccountId,
    game_uuid: Uuid,
) -> sqlx::Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("INSERT INTO account_bindings (account_id, game_uuid, updated_at) VALUES (?, ?, ?)")
        .bind(account_id)
        .bind(game_uuid)
        .bind(Utc::now())
        .execute(executor)
        .await
        .map_err(db_error!("insert_binding", account_id, game_uuid = %game_uuid))?;

    Ok(())
}

/// Re-point an existing binding at a new UUID.
///
/// Returns `false` if the account had no row to update.
pub async fn update_binding<'e, E>(
    executor: E,
    account_id: AccountId,
    game_uuid: Uuid,
) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result =
        sqlx::query("UPDATE account_bindings SET game_uuid = ?, updated_at = ? WHERE account_id = ?")
            .bind(game_uuid)
            .bind(Utc::now())
            .bind(account_id)
            .execute(executor)
            .await
            .map_err(db_error!("update_binding", account_id, game_uuid = %game_uuid))?;

    Ok(result.rows_affected() > 0)
}

/// Delete the binding held by a chat account.
pub async fn delete_binding<'e, E>(executor: E, account_id: AccountId) -> sqlx::Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM account_bindings WHERE account_id = ?")
        .bind(account_id)
        .execute(executor)
        .await
        .map_err(db_error!("delete_binding", account_id))?;

    Ok(result.rows_affected() > 0)
}

/// Count stored bindings.
pub async fn count_bindings<'e, E>(executor: E) -> sqlx::Result<i64>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM account_bindings")
        .fetch_one(executor)
        .await
        .map_err(db_error!("count_bindings", table = "account_bindings"))
}

// ============================================================================
// Permission Queries
// ============================================================================

/// Get the stored level for an account, if any.
pub async fn find_permission_level<'e, E>(
    executor: E,
    account_id: AccountId,
) -> sqlx::Result<Option<i64>>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar("SELECT level FROM permission_levels WHERE account_id = ?")
        .bind(account_id)
        .fetch_optional(executor)
        .await
        .map_err(db_error!("find_permission_level", account_id))
}

/// Insert or replace the level for an account.
pub async fn upsert_permission_level<'e, E>(
    executor: E,
    account_id: AccountId,
    level: i64,
) -> sqlx::Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO permission_levels (account_id, level)
        VALUES (?, ?)
        ON CONFLICT (account_id) DO UPDATE SET level = excluded.level
        ",
    )
    .bind(account_id)
    .bind(level)
    .execute(executor)
    .await
    .map_err(db_error!("upsert_permission_level", account_id, level))?;

    Ok(())
}
