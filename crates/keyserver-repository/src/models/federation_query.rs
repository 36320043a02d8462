#![allow(unreachable_pub)]

use sea_orm::{
    entity::prelude::{DeriveRelation, EnumIter},
    prelude::{ActiveModelBehavior, DeriveEntityModel, DerivePrimaryKey, PrimaryKeyTrait},
};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "federation_query")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub query_id: String,
    pub server_addr: String,
    #[sea_orm(column_type = "Text")]
    pub include_regions: String,
    #[sea_orm(column_type = "Text")]
    pub exclude_regions: String,
    pub last_timestamp: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
