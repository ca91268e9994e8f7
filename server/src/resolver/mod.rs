//! Identity Resolver
//!
//! Translates between a game account display name and its UUID.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identity lookup errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The service answered, but has no such account.
    #[error("No game account found for {0}")]
    NotFound(String),

    /// The lookup did not finish in time.
    #[error("Identity lookup timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or decoding failure.
    #[error("Identity lookup failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Canonical game account profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameProfile {
    /// Display name with the service's capitalization.
    pub name: String,
    /// Account UUID. Accepted with or without hyphens.
    pub id: Uuid,
}

/// Name/UUID lookup contract.
///
/// Implementations must report "no such account" as [`ResolveError::NotFound`]
/// and must never coerce a failed lookup into a default value.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a display name to its canonical profile.
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, ResolveError>;

    /// Resolve a UUID to the account's current display name.
    async fn resolve_by_uuid(&self, id: Uuid) -> Result<String, ResolveError>;
}

/// One entry of an account's name history.
#[derive(Debug, Deserialize)]
struct NameRecord {
    name: String,
}

/// Resolver backed by the Mojang profile API.
#[derive(Debug, Clone)]
pub struct MojangResolver {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl MojangResolver {
    /// Build a resolver against `api_url` (e.g. `https://api.mojang.com`).
    ///
    /// The default reqwest user agent is blocked by the service, so every
    /// request carries `user_agent` instead.
    pub fn new(api_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ResolveError> {
        self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Timeout(self.timeout)
            } else {
                ResolveError::Http(e)
            }
        })
    }
}

#[async_trait]
impl IdentityResolver for MojangResolver {
    async fn resolve_by_name(&self, name: &str) -> Result<GameProfile, ResolveError> {
        let url = format!("{}/users/profiles/minecraft/{name}", self.api_url);
        let response = self.get(&url).await?;

        if response.status() != StatusCode::OK {
            warn!(name, status = %response.status(), "Profile lookup by name was not successful");
            return Err(ResolveError::NotFound(name.to_string()));
        }

        let profile: GameProfile = response.json().await?;
        debug!(name = %profile.name, id = %profile.id, "Resolved game profile");
        Ok(profile)
    }

    /// Reads the account's name history, which the service returns oldest
    /// first, and answers with its last entry (the current name).
    async fn resolve_by_uuid(&self, id: Uuid) -> Result<String, ResolveError> {
        let url = format!("{}/user/profiles/{}/names", self.api_url, id.simple());
        let response = self.get(&url).await?;

        if response.status() != StatusCode::OK {
            warn!(%id, status = %response.status(), "Name history lookup was not successful");
            return Err(ResolveError::NotFound(id.to_string()));
        }

        let mut history: Vec<NameRecord> = response.json().await?;
        history
            .pop()
            .map(|record| record.name)
            .ok_or_else(|| ResolveError::NotFound(id.to_string()))
    }
}
