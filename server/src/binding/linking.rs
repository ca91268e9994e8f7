//! Account Linking
//!
//! User-level flows behind the chat commands: validate and resolve a game
//! account name, then run the binding protocol with allow-list side effects.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::error::{BindError, BindResult};
use super::service::{BindOutcome, BindingService};
use crate::db::AccountId;
use crate::resolver::{GameProfile, IdentityResolver, ResolveError};
use crate::whitelist::{AllowListSync, WhitelistChannel};

static GAME_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,16}$").expect("valid regex"));

/// Reject names the game would never accept before any lookup happens.
pub fn validate_name(name: &str) -> BindResult<()> {
    if GAME_NAME.is_match(name) {
        Ok(())
    } else {
        Err(BindError::InvalidName(name.to_string()))
    }
}

/// Successful link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linked {
    /// Canonical profile of the requested name.
    pub profile: GameProfile,
    pub outcome: BindOutcome,
}

/// Links chat accounts to game accounts by name.
#[derive(Clone)]
pub struct AccountLinker {
    bindings: Arc<BindingService>,
    resolver: Arc<dyn IdentityResolver>,
    whitelist: Arc<dyn WhitelistChannel>,
}

impl AccountLinker {
    #[must_use]
    pub fn new(
        bindings: Arc<BindingService>,
        resolver: Arc<dyn IdentityResolver>,
        whitelist: Arc<dyn WhitelistChannel>,
    ) -> Self {
        Self {
            bindings,
            resolver,
            whitelist,
        }
    }

    #[must_use]
    pub fn bindings(&self) -> &BindingService {
        &self.bindings
    }

    /// Bind `account_id` to the game account called `name`.
    ///
    /// A name held by someone else is reported as [`BindError::Conflict`].
    pub async fn link(&self, account_id: AccountId, name: &str) -> BindResult<Linked> {
        validate_name(name)?;
        let profile = self.resolve(name).await?;

        let effects = AllowListSync::new(self.resolver.as_ref(), self.whitelist.as_ref())
            .with_profile(&profile);
        let outcome = self.bindings.bind(account_id, profile.id, &effects).await?;

        if let BindOutcome::Conflict { owner } = outcome {
            return Err(BindError::Conflict {
                name: profile.name,
                owner,
            });
        }

        info!(account_id, name = %profile.name, "Account linked");
        Ok(Linked { profile, outcome })
    }

    /// Remove the binding of `account_id` together with its allow-list entry.
    ///
    /// Returns the UUID that was unbound, if there was one.
    pub async fn unlink(&self, account_id: AccountId) -> BindResult<Option<Uuid>> {
        let effects = AllowListSync::new(self.resolver.as_ref(), self.whitelist.as_ref());
        self.bindings.unbind(account_id, &effects).await
    }

    /// Bound game account of `account_id`, with its current name.
    pub async fn lookup(&self, account_id: AccountId) -> BindResult<Option<GameProfile>> {
        let Some(binding) = self.bindings.binding_of(account_id).await? else {
            return Ok(None);
        };

        let after = self.bindings.external_timeout();
        let name = tokio::time::timeout(after, self.resolver.resolve_by_uuid(binding.game_uuid))
            .await
            .map_err(|_| ResolveError::Timeout(after))??;

        Ok(Some(GameProfile {
            name,
            id: binding.game_uuid,
        }))
    }

    async fn resolve(&self, name: &str) -> BindResult<GameProfile> {
        let after = self.bindings.external_timeout();
        let profile = tokio::time::timeout(after, self.resolver.resolve_by_name(name))
            .await
            .map_err(|_| ResolveError::Timeout(after))??;
        Ok(profile)
    }
}
