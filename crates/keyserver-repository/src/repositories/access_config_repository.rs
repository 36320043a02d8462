use std::time::Duration;

use keyserver_domain::AccessConfig;
use sea_orm::{
    ActiveValue, EntityTrait, QueryOrder,
    sea_query::OnConflict,
};

use crate::{
    error::{DbResultExt, Result},
    models::api_config::{ActiveModel, Column, Entity, Model},
    observability::observed,
    store::{Isolation, Store},
    time::{decode_regions, encode_regions},
};

#[derive(Clone)]
pub struct AccessConfigRepository {
    store: Store,
}

impl AccessConfigRepository {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// Loads every configured application in one read-committed snapshot.
    pub async fn read_all(&self) -> Result<Vec<AccessConfig>> {
        observed("access_config", "read_all", async {
            let tx = self
                .store
                .begin("access_config.read_all", Isolation::ReadCommitted)
                .await?;
            let result = async {
                let rows = Entity::find()
                    .order_by_asc(Column::AppPackageName)
                    .all(tx.conn())
                    .await
                    .context("reading api configs")?;
                rows.into_iter().map(to_access_config).collect()
            }
            .await;
            tx.finish(result).await
        })
        .await
    }

    pub async fn upsert(&self, config: &AccessConfig) -> Result<()> {
        observed("access_config", "upsert", async {
            let model = to_active_model(config)?;
            Entity::insert(model)
                .on_conflict(
                    OnConflict::column(Column::AppPackageName)
                        .update_columns([
                            Column::ApkDigest,
                            Column::EnforceApkDigest,
                            Column::CtsProfileMatch,
                            Column::BasicIntegrity,
                            Column::MaxAgeSeconds,
                            Column::ClockSkewSeconds,
                            Column::AllowedRegions,
                            Column::AllRegions,
                            Column::BypassSafetynet,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(self.store.connection())
                .await
                .context(format!("upserting api config {:?}", config.app_package_name))?;
            Ok(())
        })
        .await
    }
}

fn to_access_config(model: Model) -> Result<AccessConfig> {
    let allowed_regions = decode_regions(&model.allowed_regions)?;
    Ok(AccessConfig {
        app_package_name: model.app_package_name,
        apk_digest_sha256: model.apk_digest,
        enforce_apk_digest: model.enforce_apk_digest,
        cts_profile_match: model.cts_profile_match,
        basic_integrity: model.basic_integrity,
        max_age: Duration::from_secs(model.max_age_seconds.max(0) as u64),
        clock_skew: Duration::from_secs(model.clock_skew_seconds.max(0) as u64),
        allowed_regions: allowed_regions.into_iter().collect(),
        allow_all_regions: model.all_regions,
        bypass_safetynet: model.bypass_safetynet,
    })
}

fn to_active_model(config: &AccessConfig) -> Result<ActiveModel> {
    let mut regions: Vec<String> = config.allowed_regions.iter().cloned().collect();
    regions.sort();

    Ok(ActiveModel {
        app_package_name: ActiveValue::Set(config.app_package_name.clone()),
        apk_digest: ActiveValue::Set(config.apk_digest_sha256.clone()),
        enforce_apk_digest: ActiveValue::Set(config.enforce_apk_digest),
        cts_profile_match: ActiveValue::Set(config.cts_profile_match),
        basic_integrity: ActiveValue::Set(config.basic_integrity),
        max_age_seconds: ActiveValue::Set(config.max_age.as_secs() as i64),
        clock_skew_seconds: ActiveValue::Set(config.clock_skew.as_secs() as i64),
        allowed_regions: ActiveValue::Set(encode_regions(&regions)?),
        all_regions: ActiveValue::Set(config.allow_all_regions),
        bypass_safetynet: ActiveValue::Set(config.bypass_safetynet),
    })
}
