//! Database Models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Numeric identifier of a chat account.
pub type AccountId = i64;

/// Chat account bound to a game account.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct AccountBinding {
    pub account_id: AccountId,
    pub game_uuid: Uuid,
    /// When the binding was created or last re-pointed.
    pub updated_at: DateTime<Utc>,
}

/// Stored authorization level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct PermissionRecord {
    pub account_id: AccountId,
    pub level: i64,
}
