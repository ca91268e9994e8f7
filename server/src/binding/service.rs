//! Binding Service
//!
//! Keeps the binding store and the remote allow-list in lockstep.
//!
//! Every request runs in one store transaction. Allow-list side effects are
//! invoked inside that transaction, before the local write they belong to can
//! become durable, and a failed or timed-out side effect rolls the whole
//! transaction back. Each path ends in a full commit or a full rollback.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::error::{BindError, BindResult};
use crate::db::{AccountBinding, AccountId, BindingTx, Store};

/// External allow-list side effects of a bind/unbind request.
///
/// Supplied by the caller for each request so it can route them through its
/// own transport and report failures in its own terms.
#[async_trait]
pub trait AllowListEffects: Send + Sync {
    /// Remove the allow-list entry belonging to `game_uuid`.
    async fn revoke(&self, game_uuid: Uuid) -> BindResult<()>;

    /// Create the allow-list entry belonging to `game_uuid`.
    async fn admit(&self, game_uuid: Uuid) -> BindResult<()>;
}

/// Result of a bind request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The account now holds the UUID. `previous` was replaced, if any.
    Bound {
        account_id: AccountId,
        previous: Option<Uuid>,
    },
    /// The account already held this UUID; nothing was done.
    Unchanged { account_id: AccountId },
    /// Another account holds the UUID; nothing was done.
    Conflict { owner: AccountId },
}

impl BindOutcome {
    /// Account that owns the requested UUID after the call.
    pub const fn owner(&self) -> AccountId {
        match *self {
            Self::Bound { account_id, .. } | Self::Unchanged { account_id } => account_id,
            Self::Conflict { owner } => owner,
        }
    }

    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Decision taken by the first phase of a bind, before any side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindPlan {
    Conflict { owner: AccountId },
    Unchanged,
    Replace { previous: Option<Uuid> },
}

/// Result of the write step of a bind.
enum Written {
    /// Row written; the transaction awaits the allow-list addition.
    Pending(BindingTx),
    /// The UUID turned out to be held by someone else; already rolled back.
    Lost(BindOutcome),
}

/// Bind/unbind protocol over the binding store.
pub struct BindingService {
    store: Store,
    external_timeout: Duration,
    // Conflict check, side effects and write form one critical section
    serial: Mutex<()>,
}

impl BindingService {
    /// Take ownership of the store. Every external call is bounded by `external_timeout`.
    #[must_use]
    pub fn new(store: Store, external_timeout: Duration) -> Self {
        Self {
            store,
            external_timeout,
            serial: Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn external_timeout(&self) -> Duration {
        self.external_timeout
    }

    /// Current binding of an account.
    pub async fn binding_of(&self, account_id: AccountId) -> BindResult<Option<AccountBinding>> {
        Ok(self.store.find_binding(account_id).await?)
    }

    /// Bind `account_id` to `game_uuid`.
    ///
    /// The previous allow-list entry of the account is removed before the row
    /// is re-pointed, and the new entry is created before the transaction
    /// commits. A conflict is reported through [`BindOutcome::Conflict`] and
    /// leaves both the store and the allow-list untouched.
    #[instrument(skip(self, effects))]
    pub async fn bind(
        &self,
        account_id: AccountId,
        game_uuid: Uuid,
        effects: &dyn AllowListEffects,
    ) -> BindResult<BindOutcome> {
        let _serial = self.serial.lock().await;
        let mut tx = self.store.begin().await?;

        // Phase 1: conflict check and plan, no side effects yet
        let plan = match plan_bind(&mut tx, account_id, game_uuid).await {
            Ok(plan) => plan,
            Err(e) => return Err(abort(tx, e.into()).await),
        };

        let previous = match plan {
            BindPlan::Conflict { owner } => {
                tx.rollback().await;
                info!(owner, "Game UUID is bound to another account");
                return Ok(BindOutcome::Conflict { owner });
            }
            BindPlan::Unchanged => {
                tx.rollback().await;
                info!("Account already holds this game UUID");
                return Ok(BindOutcome::Unchanged { account_id });
            }
            BindPlan::Replace { previous } => previous,
        };

        // Phase 2: side effects at their fixed points, then commit
        if let Some(old) = previous {
            if let Err(e) = self.external("allow-list removal", effects.revoke(old)).await {
                return Err(abort(tx, e).await);
            }
        }

        // The row is unchanged on every early return below, so a revoked
        // previous entry has to be put back
        let tx = match self.write(tx, account_id, game_uuid, previous).await {
            Ok(Written::Pending(tx)) => tx,
            Ok(Written::Lost(outcome)) => {
                self.restore(previous, effects).await;
                return Ok(outcome);
            }
            Err(e) => {
                self.restore(previous, effects).await;
                return Err(e);
            }
        };

        if let Err(e) = self.external("allow-list addition", effects.admit(game_uuid)).await {
            return Err(self.admit_failed(tx, account_id, previous, e, effects).await);
        }

        if let Err(e) = tx.commit().await {
            // No compensating removal is issued for the entry added above
            error!(error = %e, "Commit failed after the allow-list entry was added");
            return Err(e.into());
        }

        info!(previous = ?previous, "Account bound");
        Ok(BindOutcome::Bound {
            account_id,
            previous,
        })
    }

    /// Remove the binding of `account_id`.
    ///
    /// Returns the UUID that was bound, or `None` if the account had no
    /// binding (no side effect is attempted in that case). The allow-list
    /// entry is removed before the row is deleted; if that fails the binding
    /// is kept.
    #[instrument(skip(self, effects))]
    pub async fn unbind(
        &self,
        account_id: AccountId,
        effects: &dyn AllowListEffects,
    ) -> BindResult<Option<Uuid>> {
        let _serial = self.serial.lock().await;
        let mut tx = self.store.begin().await?;

        let binding = match tx.binding_of(account_id).await {
            Ok(binding) => binding,
            Err(e) => return Err(abort(tx, e.into()).await),
        };

        let Some(binding) = binding else {
            tx.commit().await?;
            return Ok(None);
        };

        if let Err(e) = self
            .external("allow-list removal", effects.revoke(binding.game_uuid))
            .await
        {
            return Err(abort(tx, e).await);
        }

        if let Err(e) = tx.delete_binding(account_id).await {
            error!(error = %e, "Delete failed after the allow-list entry was removed");
            return Err(abort(tx, e.into()).await);
        }

        tx.commit().await?;
        info!(game_uuid = %binding.game_uuid, "Account unbound");
        Ok(Some(binding.game_uuid))
    }

    /// Run one external side effect under the configured timeout.
    async fn external<F>(&self, step: &'static str, effect: F) -> BindResult<()>
    where
        F: Future<Output = BindResult<()>> + Send,
    {
        match tokio::time::timeout(self.external_timeout, effect).await {
            Ok(result) => result,
            Err(_) => Err(BindError::Timeout {
                step,
                after: self.external_timeout,
            }),
        }
    }

    /// Point the account's row at `game_uuid` inside `tx`.
    async fn write(
        &self,
        mut tx: BindingTx,
        account_id: AccountId,
        game_uuid: Uuid,
        previous: Option<Uuid>,
    ) -> BindResult<Written> {
        let written = match previous {
            Some(_) => tx.update_binding(account_id, game_uuid).await.map(|_| ()),
            None => tx.insert_binding(account_id, game_uuid).await,
        };

        match written {
            Ok(()) => Ok(Written::Pending(tx)),
            Err(e) if is_unique_violation(&e) => {
                let outcome = self.lost_race(tx, game_uuid, previous).await?;
                Ok(Written::Lost(outcome))
            }
            Err(e) => Err(abort(tx, e.into()).await),
        }
    }

    /// Best-effort re-admission of a revoked previous entry.
    async fn restore(&self, previous: Option<Uuid>, effects: &dyn AllowListEffects) {
        let Some(old) = previous else {
            return;
        };
        match self.external("allow-list restore", effects.admit(old)).await {
            Ok(()) => info!(%old, "Previous allow-list entry restored"),
            Err(e) => error!(%old, error = %e, "Previous allow-list entry could not be restored"),
        }
    }

    /// The new entry was refused after the previous one was already removed.
    ///
    /// The previous entry is put back so the rolled-back row is true again. If
    /// that fails too, neither entry is on the allow-list and the row is
    /// deleted instead.
    async fn admit_failed(
        &self,
        tx: BindingTx,
        account_id: AccountId,
        previous: Option<Uuid>,
        err: BindError,
        effects: &dyn AllowListEffects,
    ) -> BindError {
        let Some(old) = previous else {
            return abort(tx, err).await;
        };

        match self.external("allow-list restore", effects.admit(old)).await {
            Ok(()) => {
                info!(%old, "Previous allow-list entry restored");
                abort(tx, err).await
            }
            Err(restore) => {
                error!(
                    %old,
                    error = %restore,
                    "Previous allow-list entry could not be restored, dropping the binding"
                );
                if let Err(e) = drop_binding(tx, account_id).await {
                    error!(%old, error = %e, "Failed to drop binding without an allow-list entry");
                }
                BindError::Unrestored {
                    previous: old,
                    source: Box::new(err),
                }
            }
        }
    }

    /// Another writer bound the UUID between the check and the write.
    ///
    /// Binding transactions hold the write lock from the start, so this only
    /// happens if the row appeared outside that lock. The schema constraint
    /// rejected the write, so the request resolves as a conflict.
    async fn lost_race(
        &self,
        mut tx: BindingTx,
        game_uuid: Uuid,
        previous: Option<Uuid>,
    ) -> BindResult<BindOutcome> {
        let owner = match tx.owner_of(game_uuid).await {
            Ok(Some(binding)) => binding.account_id,
            Ok(None) => {
                return Err(abort(tx, BindError::Storage(sqlx::Error::RowNotFound)).await);
            }
            Err(e) => return Err(abort(tx, e.into()).await),
        };
        tx.rollback().await;

        if let Some(old) = previous {
            error!(
                %old,
                owner,
                "Bind lost a uniqueness race after the previous allow-list entry was removed, restoring it"
            );
        } else {
            warn!(owner, "Bind lost a uniqueness race");
        }
        Ok(BindOutcome::Conflict { owner })
    }
}

/// First phase of a bind: decide what to do without touching anything.
async fn plan_bind(
    tx: &mut BindingTx,
    account_id: AccountId,
    game_uuid: Uuid,
) -> sqlx::Result<BindPlan> {
    if let Some(owner) = tx.owner_of(game_uuid).await? {
        // One UUID per account, so if the requester owns it, it is their binding
        if owner.account_id == account_id {
            return Ok(BindPlan::Unchanged);
        }
        return Ok(BindPlan::Conflict {
            owner: owner.account_id,
        });
    }

    let previous = tx.binding_of(account_id).await?.map(|b| b.game_uuid);
    Ok(BindPlan::Replace { previous })
}

/// Delete the account's row and commit, discarding the uncommitted re-point.
async fn drop_binding(mut tx: BindingTx, account_id: AccountId) -> sqlx::Result<()> {
    if let Err(e) = tx.delete_binding(account_id).await {
        tx.rollback().await;
        return Err(e);
    }
    tx.commit().await
}

/// Roll back and hand the error back for propagation.
async fn abort(tx: BindingTx, err: BindError) -> BindError {
    warn!(error = %err, "Rolling back binding transaction");
    tx.rollback().await;
    err
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
