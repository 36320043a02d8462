#![allow(unreachable_pub)]

use sea_orm::{
    entity::prelude::{DeriveRelation, EnumIter},
    prelude::{ActiveModelBehavior, DeriveEntityModel, DerivePrimaryKey, PrimaryKeyTrait},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "export_batch")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub batch_id: i32,
    pub region: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub batch_num: i32,
    pub batch_size: i32,
    pub max_records: i32,
    pub status: String,
    pub lease_expires: i64,
    pub filename: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
