use chrono::{DateTime, Utc};
use keyserver_domain::{ExportWindow, Exposure};
use sea_orm::{
    ActiveValue, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, OnConflict},
};

use crate::{
    error::{DbResultExt, RepositoryError, Result},
    models::exposure::{ActiveModel, Column, Entity, Model},
    observability::observed,
    store::Store,
    time::{from_unix, to_unix},
    types::RegionCount,
};

/// Rows per INSERT statement; keeps bind parameters under backend limits.
const INSERT_CHUNK_SIZE: usize = 500;

#[derive(Clone)]
pub struct ExposureRepository {
    store: Store,
}

impl ExposureRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Inserts exposures, skipping keys that are already stored.
    ///
    /// Returns how many rows were actually inserted. Large inputs are written
    /// in several statements outside a transaction, so a failure part way
    /// leaves earlier chunks stored; re-inserting is harmless.
    pub async fn insert_exposures(&self, exposures: &[Exposure]) -> Result<u64> {
        if exposures.is_empty() {
            return Ok(0);
        }

        observed("exposure", "insert_exposures", async {
            let mut inserted = 0;
            for chunk in exposures.chunks(INSERT_CHUNK_SIZE) {
                let models: Vec<ActiveModel> = chunk.iter().map(to_active_model).collect();
                inserted += Entity::insert_many(models)
                    .on_conflict(OnConflict::column(Column::ExposureKey).do_nothing().to_owned())
                    .exec_without_returning(self.store.connection())
                    .await
                    .context("inserting exposures")?;
            }
            Ok(inserted)
        })
        .await
    }

    /// Oldest `created_at` in `[from, until)`, used to skip empty windows.
    pub async fn earliest_created_at(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        observed("exposure", "earliest_created_at", async {
            let earliest: Option<Option<i64>> = Entity::find()
                .select_only()
                .column_as(Column::CreatedAt.min(), "earliest")
                .filter(Column::CreatedAt.gte(to_unix(from)))
                .filter(Column::CreatedAt.lt(to_unix(until)))
                .into_tuple()
                .one(self.store.connection())
                .await
                .context("finding earliest exposure")?;

            earliest.flatten().map(from_unix).transpose()
        })
        .await
    }

    /// Number of exposures per region created inside `window`, ordered by
    /// region.
    pub async fn count_by_region(&self, window: &ExportWindow) -> Result<Vec<RegionCount>> {
        observed("exposure", "count_by_region", async {
            let rows: Vec<(String, i64)> = Entity::find()
                .select_only()
                .column(Column::Region)
                .column_as(Expr::col(Column::ExposureKey).count(), "count")
                .filter(Column::CreatedAt.gte(to_unix(window.start)))
                .filter(Column::CreatedAt.lt(to_unix(window.end)))
                .group_by(Column::Region)
                .order_by_asc(Column::Region)
                .into_tuple()
                .all(self.store.connection())
                .await
                .context(format!("counting exposures in {}..{}", window.start, window.end))?;

            rows.into_iter()
                .map(|(region, count)| {
                    let count = u64::try_from(count).map_err(|_| {
                        RepositoryError::InvalidData(format!("negative count for {}", region))
                    })?;
                    Ok(RegionCount { region, count })
                })
                .collect()
        })
        .await
    }

    /// One page of a region's exposures inside `window`.
    ///
    /// Rows are ordered by key bytes, then `created_at`, so the same offset
    /// always yields the same page.
    pub async fn find_for_batch(
        &self,
        region: &str,
        window: &ExportWindow,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Exposure>> {
        observed("exposure", "find_for_batch", async {
            let rows = Entity::find()
                .filter(Column::Region.eq(region))
                .filter(Column::CreatedAt.gte(to_unix(window.start)))
                .filter(Column::CreatedAt.lt(to_unix(window.end)))
                .order_by_asc(Column::ExposureKey)
                .order_by_asc(Column::CreatedAt)
                .offset(offset)
                .limit(limit)
                .all(self.store.connection())
                .await
                .context(format!("loading exposures for region {}", region))?;

            rows.into_iter().map(to_exposure).collect()
        })
        .await
    }
}

fn to_active_model(exposure: &Exposure) -> ActiveModel {
    ActiveModel {
        exposure_key: ActiveValue::Set(exposure.exposure_key.clone()),
        transmission_risk: ActiveValue::Set(exposure.transmission_risk),
        app_package_name: ActiveValue::Set(exposure.app_package_name.clone()),
        region: ActiveValue::Set(exposure.region.clone()),
        interval_number: ActiveValue::Set(exposure.interval_number),
        interval_count: ActiveValue::Set(exposure.interval_count),
        created_at: ActiveValue::Set(to_unix(exposure.created_at)),
        local_provenance: ActiveValue::Set(exposure.local_provenance),
        sync_id: ActiveValue::Set(exposure.sync_id.clone()),
    }
}

fn to_exposure(model: Model) -> Result<Exposure> {
    Ok(Exposure {
        created_at: from_unix(model.created_at)?,
        exposure_key: model.exposure_key,
        transmission_risk: model.transmission_risk,
        app_package_name: model.app_package_name,
        region: model.region,
        interval_number: model.interval_number,
        interval_count: model.interval_count,
        local_provenance: model.local_provenance,
        sync_id: model.sync_id,
    })
}
