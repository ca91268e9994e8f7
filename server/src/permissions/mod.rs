//! Permission System
//!
//! Per-account authorization levels. An account without a stored level is at
//! level 0. Levels are independent of bindings and survive an unbind.

use tracing::info;

use crate::db::{self, AccountId, Store};

/// Level assumed for accounts that were never assigned one.
pub const DEFAULT_LEVEL: i64 = 0;

/// Get/set authorization levels.
#[derive(Debug, Clone)]
pub struct PermissionService {
    store: Store,
}

impl PermissionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Level of `account_id`, or [`DEFAULT_LEVEL`] if none was stored.
    ///
    /// Fails only when the database cannot be reached.
    pub async fn get_level(&self, account_id: AccountId) -> sqlx::Result<i64> {
        let level = db::find_permission_level(self.store.pool(), account_id).await?;
        Ok(level.unwrap_or(DEFAULT_LEVEL))
    }

    /// Store `level` for `account_id`, replacing any previous value.
    pub async fn set_level(&self, account_id: AccountId, level: i64) -> sqlx::Result<()> {
        db::upsert_permission_level(self.store.pool(), account_id, level).await?;
        info!(account_id, level, "Permission level set");
        Ok(())
    }

    /// Whether `account_id` is at or above `required`.
    pub async fn has_level(&self, account_id: AccountId, required: i64) -> sqlx::Result<bool> {
        Ok(self.get_level(account_id).await? >= required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> PermissionService {
        PermissionService::new(Store::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_unknown_account_has_default_level() {
        let permissions = service().await;
        assert_eq!(permissions.get_level(123_456).await.unwrap(), DEFAULT_LEVEL);
    }

    #[tokio::test]
    async fn test_set_level_is_idempotent() {
        let permissions = service().await;

        permissions.set_level(7, 4).await.unwrap();
        permissions.set_level(7, 4).await.unwrap();
        assert_eq!(permissions.get_level(7).await.unwrap(), 4);

        permissions.set_level(7, 1).await.unwrap();
        assert_eq!(permissions.get_level(7).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_has_level() {
        let permissions = service().await;
        permissions.set_level(9, 2).await.unwrap();

        assert!(permissions.has_level(9, 2).await.unwrap());
        assert!(!permissions.has_level(9, 3).await.unwrap());
        assert!(permissions.has_level(10, 0).await.unwrap());
        assert!(!permissions.has_level(10, 1).await.unwrap());
    }
}
