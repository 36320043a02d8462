use std::time::Duration;

use chrono::Utc;
use sea_orm::{ActiveValue, EntityTrait, IntoActiveModel};

use crate::{
    error::{DbResultExt, RepositoryError, Result},
    models::lock::{ActiveModel, Entity},
    observability::observed,
    store::{Isolation, Store, Transaction},
    time::duration_millis,
};

/// Handle returned by a successful [`LockRepository::acquire`].
///
/// Pass it to [`LockRepository::release`] when the guarded work is done.
/// Dropping it without releasing leaves the lock row to expire on its own.
#[derive(Debug)]
#[must_use = "a lock must be released or it stays held until its TTL expires"]
pub struct LockGuard {
    lock_id: String,
}

impl LockGuard {
    pub fn lock_id(&self) -> &str {
        &self.lock_id
    }
}

/// TTL based mutual exclusion stored as rows in the `lock` table.
///
/// A lock whose expiry has passed is free and is stolen by the next
/// acquirer, so a crashed holder cannot wedge it forever.
#[derive(Clone)]
pub struct LockRepository {
    store: Store,
}

impl LockRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Single non-blocking attempt to take `lock_id` for `ttl`.
    ///
    /// Returns [`RepositoryError::AlreadyLocked`] when another holder's lock
    /// has not expired yet. Retrying is up to the caller.
    pub async fn acquire(&self, lock_id: &str, ttl: Duration) -> Result<LockGuard> {
        observed("lock", "acquire", async {
            let mut tx = self.store.begin("lock.acquire", Isolation::Serializable).await?;
            let result = Self::try_acquire(&mut tx, lock_id, ttl).await;
            tx.finish(result).await?;

            tracing::debug!(lock_id, ttl_ms = duration_millis(ttl), "Lock acquired");
            Ok(LockGuard {
                lock_id: lock_id.to_string(),
            })
        })
        .await
    }

    async fn try_acquire(tx: &mut Transaction, lock_id: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let expires = now.saturating_add(duration_millis(ttl));

        let existing = Entity::find_by_id(lock_id.to_string())
            .one(tx.conn())
            .await
            .context(format!("getting lock {:?}", lock_id))?;

        match existing {
            None => {
                let model = ActiveModel {
                    lock_id: ActiveValue::Set(lock_id.to_string()),
                    expires: ActiveValue::Set(expires),
                };
                Entity::insert(model)
                    .exec_without_returning(tx.conn())
                    .await
                    .context(format!("inserting new lock {:?}", lock_id))?;
            }
            Some(lock) if now > lock.expires => {
                tracing::info!(
                    lock_id,
                    expired_at_ms = lock.expires,
                    "Stealing expired lock"
                );
                let mut model = lock.into_active_model();
                model.expires = ActiveValue::Set(expires);
                Entity::update(model)
                    .exec(tx.conn())
                    .await
                    .context(format!("updating expired lock {:?}", lock_id))?;
            }
            Some(_) => return Err(RepositoryError::AlreadyLocked(lock_id.to_string())),
        }

        tx.mark_commit();
        Ok(())
    }

    /// Deletes the lock row.
    ///
    /// If the TTL already expired and someone else stole the lock, their row
    /// is deleted too; this is not detected.
    pub async fn release(&self, guard: LockGuard) -> Result<()> {
        observed("lock", "release", async {
            let mut tx = self.store.begin("lock.release", Isolation::Serializable).await?;
            let result = async {
                Entity::delete_by_id(guard.lock_id.clone())
                    .exec(tx.conn())
                    .await
                    .context(format!("deleting lock {:?}", guard.lock_id))?;
                tx.mark_commit();
                Ok(())
            }
            .await;
            tx.finish(result).await?;

            tracing::debug!(lock_id = %guard.lock_id, "Lock released");
            Ok(())
        })
        .await
    }
}
