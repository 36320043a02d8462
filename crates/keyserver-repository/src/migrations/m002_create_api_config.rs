use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, boolean, string, string_null, text},
    sea_query,
};

#[derive(Iden)]
enum ApiConfig {
    Table,
    AppPackageName,
    ApkDigest,
    EnforceApkDigest,
    CtsProfileMatch,
    BasicIntegrity,
    MaxAgeSeconds,
    ClockSkewSeconds,
    AllowedRegions,
    AllRegions,
    BypassSafetynet,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ApiConfig::Table)
                    .if_not_exists()
                    .col(string(ApiConfig::AppPackageName))
                    .col(string_null(ApiConfig::ApkDigest))
                    .col(boolean(ApiConfig::EnforceApkDigest).default(false))
                    .col(boolean(ApiConfig::CtsProfileMatch).default(true))
                    .col(boolean(ApiConfig::BasicIntegrity).default(true))
                    .col(big_integer(ApiConfig::MaxAgeSeconds))
                    .col(big_integer(ApiConfig::ClockSkewSeconds))
                    // JSON array of region codes
                    .col(text(ApiConfig::AllowedRegions))
                    .col(boolean(ApiConfig::AllRegions).default(false))
                    .col(boolean(ApiConfig::BypassSafetynet).default(false))
                    .primary_key(Index::create().col(ApiConfig::AppPackageName))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ApiConfig::Table).if_exists().to_owned())
            .await
    }
}
