//! Binding Error Types

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::console::ChannelError;
use crate::db::AccountId;
use crate::resolver::ResolveError;

/// Binding error types.
#[derive(Debug, Error)]
pub enum BindError {
    /// Malformed game account name, rejected before any transaction.
    #[error("{0:?} is not a valid game account name")]
    InvalidName(String),

    /// The game account is bound to a different chat account. Nothing changed.
    #[error("Game account {name} is already bound to account {owner}")]
    Conflict { name: String, owner: AccountId },

    /// Name or UUID lookup failed.
    #[error(transparent)]
    Resolver(#[from] ResolveError),

    /// Allow-list add/remove failed; the transaction was rolled back.
    #[error("Allow-list update for {name} failed: {source}")]
    Channel {
        name: String,
        #[source]
        source: ChannelError,
    },

    /// The new entry could not be added after the previous one was removed,
    /// and the previous entry could not be put back. The account's binding was
    /// dropped so the store matches the allow-list.
    #[error("Previous allow-list entry {previous} could not be restored after: {source}")]
    Unrestored {
        previous: Uuid,
        #[source]
        source: Box<BindError>,
    },

    /// An external call did not finish in time; the transaction was rolled back.
    #[error("{step} did not finish within {after:?}")]
    Timeout { step: &'static str, after: Duration },

    /// Transaction or connection failure.
    #[error("Database error")]
    Storage(#[from] sqlx::Error),
}

impl BindError {
    /// Reply text for the chat user who issued the request.
    ///
    /// Storage failures carry nothing actionable and are reported generically.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidName(name) => format!(
                "{name:?} is not a valid game account name (3-16 letters, digits or underscores)"
            ),
            Self::Conflict { name, owner } => {
                format!("Game account {name} is currently held by account {owner}")
            }
            Self::Resolver(ResolveError::NotFound(name)) => {
                format!("Could not find a game account named {name}")
            }
            Self::Resolver(_) => {
                "The account lookup service is unavailable, please try again later".to_string()
            }
            Self::Channel { name, .. } => format!(
                "Could not update the server allow-list for {name}, nothing was changed. Please try again later"
            ),
            Self::Unrestored { .. } => {
                "Could not update the server allow-list, and your previous game account may have \
                 been removed from it. You are no longer bound, please bind again"
                    .to_string()
            }
            Self::Timeout { .. } => {
                "The game server did not answer in time, nothing was changed. Please try again later"
                    .to_string()
            }
            Self::Storage(_) => "Could not access the database".to_string(),
        }
    }

    /// Whether reissuing the same request may succeed.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidName(_) | Self::Conflict { .. })
    }
}

/// Result type for binding operations.
pub type BindResult<T> = Result<T, BindError>;
