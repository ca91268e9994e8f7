//! Whitelist Channel
//!
//! Allow-list mutations on the game server, and the side-effect adapter the
//! binding protocol drives at its fixed ordering points.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::binding::{AllowListEffects, BindError, BindResult};
use crate::console::{ChannelError, Console};
use crate::resolver::{GameProfile, IdentityResolver};

/// Add/remove access to the game server's allow-list, keyed by display name.
#[async_trait]
pub trait WhitelistChannel: Send + Sync {
    async fn add(&self, name: &str) -> Result<(), ChannelError>;
    async fn remove(&self, name: &str) -> Result<(), ChannelError>;
}

/// Whitelist channel that issues `whitelist` commands over a remote console.
///
/// The response text is not interpreted: only a failed exchange is an error.
#[derive(Clone)]
pub struct ConsoleWhitelist {
    console: Arc<dyn Console>,
}

impl ConsoleWhitelist {
    #[must_use]
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }
}

#[async_trait]
impl WhitelistChannel for ConsoleWhitelist {
    async fn add(&self, name: &str) -> Result<(), ChannelError> {
        let response = self.console.execute(&format!("whitelist add {name}")).await?;
        info!(name, response = %response.trim(), "Allow-list entry added");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), ChannelError> {
        let response = self
            .console
            .execute(&format!("whitelist remove {name}"))
            .await?;
        info!(name, response = %response.trim(), "Allow-list entry removed");
        Ok(())
    }
}

/// Allow-list side effects for one bind/unbind request.
///
/// UUIDs are turned into display names through the resolver, except for the
/// profile the request already resolved, which is used as-is.
pub struct AllowListSync<'a> {
    resolver: &'a dyn IdentityResolver,
    channel: &'a dyn WhitelistChannel,
    known: Option<&'a GameProfile>,
}

impl<'a> AllowListSync<'a> {
    #[must_use]
    pub fn new(resolver: &'a dyn IdentityResolver, channel: &'a dyn WhitelistChannel) -> Self {
        Self {
            resolver,
            channel,
            known: None,
        }
    }

    /// Reuse an already resolved profile instead of looking it up again.
    #[must_use]
    pub fn with_profile(mut self, profile: &'a GameProfile) -> Self {
        self.known = Some(profile);
        self
    }

    async fn name_of(&self, game_uuid: Uuid) -> BindResult<String> {
        match self.known {
            Some(profile) if profile.id == game_uuid => Ok(profile.name.clone()),
            _ => Ok(self.resolver.resolve_by_uuid(game_uuid).await?),
        }
    }
}

#[async_trait]
impl AllowListEffects for AllowListSync<'_> {
    async fn revoke(&self, game_uuid: Uuid) -> BindResult<()> {
        let name = self.name_of(game_uuid).await?;
        let result = self.channel.remove(&name).await;
        result.map_err(|source| BindError::Channel { name, source })
    }

    async fn admit(&self, game_uuid: Uuid) -> BindResult<()> {
        let name = self.name_of(game_uuid).await?;
        let result = self.channel.add(&name).await;
        result.map_err(|source| BindError::Channel { name, source })
    }
}
