use std::time::Instant;

use chrono::{DateTime, Utc};
use keyserver_domain::{FederationQuery, FederationSync};
use sea_orm::{ActiveValue, EntityTrait, IntoActiveModel};
use uuid::Uuid;

use crate::{
    error::{DbResultExt, RepositoryError, Result},
    models::{federation_query, federation_sync},
    observability::observed,
    store::{Isolation, Store, Transaction},
    time::{decode_regions, encode_regions, from_unix, to_unix},
};

/// Ties a running sync to the history row created for it.
///
/// Only [`FederationRepository::finalize_sync`] consumes it, so a sync row can
/// be completed once and only by the caller that started it.
#[derive(Debug)]
#[must_use = "a started sync must be finalized"]
pub struct SyncHandle {
    sync_id: String,
    query_id: String,
    started: DateTime<Utc>,
    timer: Instant,
}

impl SyncHandle {
    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }
}

#[derive(Clone)]
pub struct FederationRepository {
    store: Store,
}

impl FederationRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn get_query(&self, query_id: &str) -> Result<FederationQuery> {
        observed("federation", "get_query", async {
            let model = federation_query::Entity::find_by_id(query_id.to_string())
                .one(self.store.connection())
                .await
                .context(format!("getting query {:?}", query_id))?
                .ok_or_else(|| RepositoryError::NotFound(format!("query {:?}", query_id)))?;
            to_federation_query(model)
        })
        .await
    }

    /// Replaces any existing query with the same id, cursor included.
    pub async fn add_query(&self, query: &FederationQuery) -> Result<()> {
        observed("federation", "add_query", async {
            let mut tx = self
                .store
                .begin("federation.add_query", Isolation::Serializable)
                .await?;
            let result = Self::replace_query(&mut tx, query).await;
            tx.finish(result).await
        })
        .await
    }

    async fn replace_query(tx: &mut Transaction, query: &FederationQuery) -> Result<()> {
        federation_query::Entity::delete_by_id(query.query_id.clone())
            .exec(tx.conn())
            .await
            .context(format!("deleting query {:?}", query.query_id))?;

        let model = federation_query::ActiveModel {
            query_id: ActiveValue::Set(query.query_id.clone()),
            server_addr: ActiveValue::Set(query.server_addr.clone()),
            include_regions: ActiveValue::Set(encode_regions(&query.include_regions)?),
            exclude_regions: ActiveValue::Set(encode_regions(&query.exclude_regions)?),
            last_timestamp: ActiveValue::Set(to_unix(query.last_timestamp)),
        };
        federation_query::Entity::insert(model)
            .exec_without_returning(tx.conn())
            .await
            .context(format!("inserting query {:?}", query.query_id))?;

        tx.mark_commit();
        Ok(())
    }

    pub async fn get_sync(&self, sync_id: &str) -> Result<FederationSync> {
        observed("federation", "get_sync", async {
            let model = federation_sync::Entity::find_by_id(sync_id.to_string())
                .one(self.store.connection())
                .await
                .context(format!("getting sync {:?}", sync_id))?
                .ok_or_else(|| RepositoryError::NotFound(format!("sync {:?}", sync_id)))?;
            to_federation_sync(model)
        })
        .await
    }

    /// Records the start of a sync and returns its id plus the handle needed
    /// to finalize it.
    pub async fn start_sync(
        &self,
        query: &FederationQuery,
        started: DateTime<Utc>,
    ) -> Result<(String, SyncHandle)> {
        observed("federation", "start_sync", async {
            let timer = Instant::now();
            let sync_id = Uuid::new_v4().to_string();

            let model = federation_sync::ActiveModel {
                sync_id: ActiveValue::Set(sync_id.clone()),
                query_id: ActiveValue::Set(query.query_id.clone()),
                started: ActiveValue::Set(to_unix(started)),
                completed: ActiveValue::Set(None),
                insertions: ActiveValue::Set(None),
                max_timestamp: ActiveValue::Set(None),
            };
            federation_sync::Entity::insert(model)
                .exec_without_returning(self.store.connection())
                .await
                .context(format!("inserting sync for query {:?}", query.query_id))?;

            tracing::debug!(sync_id = %sync_id, query_id = %query.query_id, "Sync started");

            let handle = SyncHandle {
                sync_id: sync_id.clone(),
                query_id: query.query_id.clone(),
                started,
                timer,
            };
            Ok((sync_id, handle))
        })
        .await
    }

    /// Completes the sync row and, if anything was inserted, moves the query
    /// cursor forward to `max_timestamp`.
    ///
    /// The cursor never moves backward: a `max_timestamp` at or before the
    /// stored cursor leaves it unchanged.
    pub async fn finalize_sync(
        &self,
        handle: SyncHandle,
        max_timestamp: DateTime<Utc>,
        total_inserted: u32,
    ) -> Result<()> {
        observed("federation", "finalize_sync", async {
            let mut tx = self
                .store
                .begin("federation.finalize_sync", Isolation::Serializable)
                .await?;
            let result = Self::complete_sync(&mut tx, &handle, max_timestamp, total_inserted).await;
            tx.finish(result).await?;

            tracing::info!(
                sync_id = %handle.sync_id,
                query_id = %handle.query_id,
                insertions = total_inserted,
                max_timestamp = %max_timestamp,
                "Sync finalized"
            );
            Ok(())
        })
        .await
    }

    async fn complete_sync(
        tx: &mut Transaction,
        handle: &SyncHandle,
        max_timestamp: DateTime<Utc>,
        total_inserted: u32,
    ) -> Result<()> {
        if total_inserted > 0 {
            let query = federation_query::Entity::find_by_id(handle.query_id.clone())
                .one(tx.conn())
                .await
                .context(format!("getting query {:?}", handle.query_id))?;

            match query {
                Some(query) if to_unix(max_timestamp) > query.last_timestamp => {
                    let mut model = query.into_active_model();
                    model.last_timestamp = ActiveValue::Set(to_unix(max_timestamp));
                    federation_query::Entity::update(model)
                        .exec(tx.conn())
                        .await
                        .context(format!("updating cursor of query {:?}", handle.query_id))?;
                }
                Some(_) => {}
                // Deleted while the sync ran; the history row is still completed.
                None => tracing::warn!(
                    sync_id = %handle.sync_id,
                    query_id = %handle.query_id,
                    "Query no longer exists; cursor not updated"
                ),
            }
        }

        let elapsed = chrono::Duration::from_std(handle.timer.elapsed())
            .map_err(|e| RepositoryError::InvalidData(format!("sync duration: {}", e)))?;
        let completed = handle.started + elapsed;
        let insertions = i32::try_from(total_inserted).map_err(|_| {
            RepositoryError::InvalidData(format!("insertion count {} too large", total_inserted))
        })?;

        let model = federation_sync::ActiveModel {
            sync_id: ActiveValue::Unchanged(handle.sync_id.clone()),
            completed: ActiveValue::Set(Some(to_unix(completed))),
            insertions: ActiveValue::Set(Some(insertions)),
            max_timestamp: ActiveValue::Set(Some(to_unix(max_timestamp))),
            ..Default::default()
        };
        federation_sync::Entity::update(model)
            .exec(tx.conn())
            .await
            .context(format!("completing sync {:?}", handle.sync_id))?;

        tx.mark_commit();
        Ok(())
    }
}

fn to_federation_query(model: federation_query::Model) -> Result<FederationQuery> {
    Ok(FederationQuery {
        include_regions: decode_regions(&model.include_regions)?,
        exclude_regions: decode_regions(&model.exclude_regions)?,
        last_timestamp: from_unix(model.last_timestamp)?,
        query_id: model.query_id,
        server_addr: model.server_addr,
    })
}

fn to_federation_sync(model: federation_sync::Model) -> Result<FederationSync> {
    Ok(FederationSync {
        started: from_unix(model.started)?,
        completed: model.completed.map(from_unix).transpose()?,
        insertions: model.insertions.map(|n| n.max(0) as u32),
        max_timestamp: model.max_timestamp.map(from_unix).transpose()?,
        sync_id: model.sync_id,
        query_id: model.query_id,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::manager::test_manager;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn query(last_timestamp: i64) -> FederationQuery {
        FederationQuery {
            query_id: "us-east".to_string(),
            server_addr: "peer.example.org:443".to_string(),
            include_regions: vec!["US".to_string(), "CA".to_string()],
            exclude_regions: vec!["MX".to_string()],
            last_timestamp: at(last_timestamp),
        }
    }

    #[tokio::test]
    async fn test_get_missing_query_is_not_found() {
        let repo = test_manager().await.federation_repository();
        assert!(matches!(
            repo.get_query("nope").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_query_round_trips() {
        let repo = test_manager().await.federation_repository();

        repo.add_query(&query(100)).await.unwrap();
        assert_eq!(repo.get_query("us-east").await.unwrap(), query(100));
    }

    #[tokio::test]
    async fn test_add_query_replaces_existing_cursor() {
        let repo = test_manager().await.federation_repository();

        repo.add_query(&query(5_000)).await.unwrap();
        let mut replacement = query(100);
        replacement.server_addr = "other.example.org".to_string();
        replacement.exclude_regions.clear();
        repo.add_query(&replacement).await.unwrap();

        let stored = repo.get_query("us-east").await.unwrap();
        assert_eq!(stored, replacement);
        assert_eq!(stored.last_timestamp, at(100));
    }

    #[tokio::test]
    async fn test_finalize_with_insertions_advances_cursor() {
        let repo = test_manager().await.federation_repository();
        let q = query(100);
        repo.add_query(&q).await.unwrap();

        let (sync_id, handle) = repo.start_sync(&q, at(1_000)).await.unwrap();
        assert!(!repo.get_sync(&sync_id).await.unwrap().is_completed());

        repo.finalize_sync(handle, at(200), 7).await.unwrap();

        assert_eq!(repo.get_query("us-east").await.unwrap().last_timestamp, at(200));
        let sync = repo.get_sync(&sync_id).await.unwrap();
        assert_eq!(sync.query_id, "us-east");
        assert_eq!(sync.started, at(1_000));
        assert_eq!(sync.insertions, Some(7));
        assert_eq!(sync.max_timestamp, Some(at(200)));
        let completed = sync.completed.unwrap();
        assert!(completed >= sync.started);
    }

    #[tokio::test]
    async fn test_finalize_without_insertions_keeps_cursor() {
        let repo = test_manager().await.federation_repository();
        let q = query(100);
        repo.add_query(&q).await.unwrap();

        let (sync_id, handle) = repo.start_sync(&q, at(1_000)).await.unwrap();
        repo.finalize_sync(handle, at(999), 0).await.unwrap();

        assert_eq!(repo.get_query("us-east").await.unwrap().last_timestamp, at(100));
        let sync = repo.get_sync(&sync_id).await.unwrap();
        assert!(sync.is_completed());
        assert_eq!(sync.insertions, Some(0));
    }

    #[tokio::test]
    async fn test_finalize_never_moves_cursor_backward() {
        let repo = test_manager().await.federation_repository();
        let q = query(500);
        repo.add_query(&q).await.unwrap();

        let (_, handle) = repo.start_sync(&q, at(1_000)).await.unwrap();
        repo.finalize_sync(handle, at(300), 2).await.unwrap();

        assert_eq!(repo.get_query("us-east").await.unwrap().last_timestamp, at(500));
    }

    #[tokio::test]
    async fn test_finalize_completes_sync_of_deleted_query() {
        let repo = test_manager().await.federation_repository();
        let q = query(100);
        repo.add_query(&q).await.unwrap();
        let (sync_id, handle) = repo.start_sync(&q, at(150)).await.unwrap();

        federation_query::Entity::delete_by_id(q.query_id.clone())
            .exec(repo.store.connection())
            .await
            .unwrap();

        repo.finalize_sync(handle, at(400), 3).await.unwrap();

        let sync = repo.get_sync(&sync_id).await.unwrap();
        assert!(sync.is_completed());
        assert_eq!(sync.insertions, Some(3));
        assert_eq!(sync.max_timestamp, Some(at(400)));
        assert!(matches!(
            repo.get_query("us-east").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_each_sync_gets_its_own_history_row() {
        let repo = test_manager().await.federation_repository();
        let q = query(0);
        repo.add_query(&q).await.unwrap();

        let (first_id, first) = repo.start_sync(&q, at(10)).await.unwrap();
        let (second_id, second) = repo.start_sync(&q, at(20)).await.unwrap();
        assert_ne!(first_id, second_id);

        repo.finalize_sync(second, at(50), 1).await.unwrap();
        assert!(!repo.get_sync(&first_id).await.unwrap().is_completed());
        repo.finalize_sync(first, at(40), 1).await.unwrap();

        assert!(repo.get_sync(&first_id).await.unwrap().is_completed());
        assert_eq!(repo.get_query("us-east").await.unwrap().last_timestamp, at(50));
    }
}
