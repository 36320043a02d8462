#![allow(unreachable_pub)]

use sea_orm::{
    entity::prelude::{DeriveRelation, EnumIter},
    prelude::{ActiveModelBehavior, DeriveEntityModel, DerivePrimaryKey, PrimaryKeyTrait},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "api_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub app_package_name: String,
    pub apk_digest: Option<String>,
    pub enforce_apk_digest: bool,
    pub cts_profile_match: bool,
    pub basic_integrity: bool,
    pub max_age_seconds: i64,
    pub clock_skew_seconds: i64,
    #[sea_orm(column_type = "Text")]
    pub allowed_regions: String,
    pub all_regions: bool,
    pub bypass_safetynet: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
