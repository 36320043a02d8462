use std::time::Duration;

use chrono::{DateTime, Utc};
use keyserver_domain::{ExportBatch, ExportBatchStatus, ExportWindow};
use sea_orm::{
    ActiveValue, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};

use crate::{
    error::{DbResultExt, RepositoryError, Result},
    models::export_batch::{ActiveModel, Column, Entity, Model},
    observability::observed,
    store::{Isolation, Store, Transaction},
    time::{duration_millis, from_unix, to_unix},
    types::NewExportBatch,
};

const INSERT_CHUNK_SIZE: usize = 500;

#[derive(Clone)]
pub struct ExportBatchRepository {
    store: Store,
}

impl ExportBatchRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// End of the newest window that already has work items.
    pub async fn latest_end_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        observed("export_batch", "latest_end_timestamp", async {
            let latest: Option<Option<i64>> = Entity::find()
                .select_only()
                .column_as(Column::EndTimestamp.max(), "latest")
                .into_tuple()
                .one(self.store.connection())
                .await
                .context("finding latest export window")?;

            latest.flatten().map(from_unix).transpose()
        })
        .await
    }

    /// Persists planned work items in one transaction, so a window is either
    /// fully planned or not at all. Items whose (region, window, batch_num)
    /// already exist are skipped, so re-planning a window is harmless.
    ///
    /// Returns the number of new rows.
    pub async fn create_batches(&self, batches: &[NewExportBatch]) -> Result<u64> {
        if batches.is_empty() {
            return Ok(0);
        }

        observed("export_batch", "create_batches", async {
            let mut tx = self
                .store
                .begin("export_batch.create_batches", Isolation::Serializable)
                .await?;
            let result = Self::insert_planned(&mut tx, batches).await;
            tx.finish(result).await
        })
        .await
    }

    async fn insert_planned(tx: &mut Transaction, batches: &[NewExportBatch]) -> Result<u64> {
        let now = Utc::now().timestamp();
        let models: Vec<ActiveModel> = batches
            .iter()
            .map(|batch| ActiveModel {
                batch_id: ActiveValue::NotSet,
                region: ActiveValue::Set(batch.region.clone()),
                start_timestamp: ActiveValue::Set(to_unix(batch.window.start)),
                end_timestamp: ActiveValue::Set(to_unix(batch.window.end)),
                batch_num: ActiveValue::Set(batch.batch_num),
                batch_size: ActiveValue::Set(batch.batch_size),
                max_records: ActiveValue::Set(batch.max_records),
                status: ActiveValue::Set(ExportBatchStatus::Created.as_str().to_string()),
                lease_expires: ActiveValue::Set(0),
                filename: ActiveValue::Set(None),
                created_at: ActiveValue::Set(now),
                updated_at: ActiveValue::Set(now),
            })
            .collect();

        let mut inserted = 0;
        for chunk in models.chunks(INSERT_CHUNK_SIZE) {
            inserted += Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::columns([
                        Column::Region,
                        Column::StartTimestamp,
                        Column::EndTimestamp,
                        Column::BatchNum,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(tx.conn())
                .await
                .context("inserting export batches")?;
        }

        tx.mark_commit();
        Ok(inserted)
    }

    /// Claims the oldest claimable work item and leases it for `lease`.
    ///
    /// Claimable means `CREATED`, `FAILED`, or `IN_PROGRESS` with an expired
    /// lease. Returns `None` when there is nothing to do.
    pub async fn claim_next(&self, lease: Duration) -> Result<Option<ExportBatch>> {
        observed("export_batch", "claim_next", async {
            let mut tx = self
                .store
                .begin("export_batch.claim_next", Isolation::Serializable)
                .await?;
            let result = Self::claim(&mut tx, lease).await;
            tx.finish(result).await
        })
        .await
    }

    async fn claim(tx: &mut Transaction, lease: Duration) -> Result<Option<ExportBatch>> {
        let now_ms = Utc::now().timestamp_millis();

        let Some(candidate) = Entity::find()
            .filter(claimable(now_ms))
            .order_by_asc(Column::BatchId)
            .one(tx.conn())
            .await
            .context("finding claimable export batch")?
        else {
            return Ok(None);
        };

        let lease_expires = now_ms.saturating_add(duration_millis(lease));
        let updated = Entity::update_many()
            .col_expr(
                Column::Status,
                Expr::value(ExportBatchStatus::InProgress.as_str()),
            )
            .col_expr(Column::LeaseExpires, Expr::value(lease_expires))
            .col_expr(Column::UpdatedAt, Expr::value(now_ms / 1000))
            .filter(Column::BatchId.eq(candidate.batch_id))
            .filter(claimable(now_ms))
            .exec(tx.conn())
            .await
            .context(format!("claiming export batch {}", candidate.batch_id))?;

        if updated.rows_affected != 1 {
            return Ok(None);
        }

        tx.mark_commit();

        let mut batch = to_export_batch(candidate)?;
        batch.status = ExportBatchStatus::InProgress;
        Ok(Some(batch))
    }

    pub async fn mark_published(&self, batch_id: i32, filename: &str) -> Result<()> {
        observed("export_batch", "mark_published", async {
            self.set_status(batch_id, ExportBatchStatus::Published, Some(filename))
                .await
        })
        .await
    }

    pub async fn mark_failed(&self, batch_id: i32) -> Result<()> {
        observed("export_batch", "mark_failed", async {
            self.set_status(batch_id, ExportBatchStatus::Failed, None).await
        })
        .await
    }

    /// Moves an `IN_PROGRESS` item to its final status. An item that is no
    /// longer in progress (published by a worker that claimed it after this
    /// one's lease ran out) is left untouched.
    async fn set_status(
        &self,
        batch_id: i32,
        status: ExportBatchStatus,
        filename: Option<&str>,
    ) -> Result<()> {
        let mut update = Entity::update_many()
            .col_expr(Column::Status, Expr::value(status.as_str()))
            .col_expr(Column::LeaseExpires, Expr::value(0i64))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now().timestamp()));
        if let Some(filename) = filename {
            update = update.col_expr(Column::Filename, Expr::value(filename));
        }

        let result = update
            .filter(Column::BatchId.eq(batch_id))
            .filter(Column::Status.eq(ExportBatchStatus::InProgress.as_str()))
            .exec(self.store.connection())
            .await
            .context(format!("setting export batch {} to {}", batch_id, status))?;

        if result.rows_affected == 0 {
            let current = self.get(batch_id).await?;
            tracing::warn!(
                batch_id,
                current = %current.status,
                requested = %status,
                "Export batch no longer in progress; status left unchanged"
            );
        }
        Ok(())
    }

    pub async fn get(&self, batch_id: i32) -> Result<ExportBatch> {
        observed("export_batch", "get", async {
            let model = Entity::find_by_id(batch_id)
                .one(self.store.connection())
                .await
                .context(format!("getting export batch {}", batch_id))?
                .ok_or_else(|| RepositoryError::NotFound(format!("export batch {}", batch_id)))?;
            to_export_batch(model)
        })
        .await
    }

    /// Every work item of a window, ordered by region then batch number.
    pub async fn find_by_window(&self, window: &ExportWindow) -> Result<Vec<ExportBatch>> {
        observed("export_batch", "find_by_window", async {
            let rows = Entity::find()
                .filter(Column::StartTimestamp.eq(to_unix(window.start)))
                .filter(Column::EndTimestamp.eq(to_unix(window.end)))
                .order_by_asc(Column::Region)
                .order_by_asc(Column::BatchNum)
                .all(self.store.connection())
                .await
                .context(format!("listing export batches of {}..{}", window.start, window.end))?;

            rows.into_iter().map(to_export_batch).collect()
        })
        .await
    }
}

fn claimable(now_ms: i64) -> Condition {
    Condition::any()
        .add(Column::Status.is_in([
            ExportBatchStatus::Created.as_str(),
            ExportBatchStatus::Failed.as_str(),
        ]))
        .add(
            Condition::all()
                .add(Column::Status.eq(ExportBatchStatus::InProgress.as_str()))
                .add(Column::LeaseExpires.lt(now_ms)),
        )
}

fn to_export_batch(model: Model) -> Result<ExportBatch> {
    let status = model
        .status
        .parse::<ExportBatchStatus>()
        .map_err(RepositoryError::InvalidData)?;

    Ok(ExportBatch {
        batch_id: model.batch_id,
        window: ExportWindow::new(
            from_unix(model.start_timestamp)?,
            from_unix(model.end_timestamp)?,
        ),
        region: model.region,
        batch_num: model.batch_num,
        batch_size: model.batch_size,
        max_records: model.max_records,
        status,
        filename: model.filename,
    })
}
