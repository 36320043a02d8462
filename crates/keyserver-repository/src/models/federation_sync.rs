#![allow(unreachable_pub)]

use sea_orm::{
    entity::prelude::{DeriveRelation, EnumIter},
    prelude::{ActiveModelBehavior, DeriveEntityModel, DerivePrimaryKey, PrimaryKeyTrait},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "federation_sync")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sync_id: String,
    pub query_id: String,
    pub started: i64,
    pub completed: Option<i64>,
    pub insertions: Option<i32>,
    pub max_timestamp: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
