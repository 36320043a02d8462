use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, binary, boolean, integer, string, string_null},
    sea_query,
};

#[derive(Iden)]
enum Exposure {
    Table,
    ExposureKey,
    TransmissionRisk,
    AppPackageName,
    Region,
    IntervalNumber,
    IntervalCount,
    CreatedAt,
    LocalProvenance,
    SyncId,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Exposure::Table)
                    .if_not_exists()
                    .col(binary(Exposure::ExposureKey))
                    .col(integer(Exposure::TransmissionRisk))
                    .col(string(Exposure::AppPackageName))
                    .col(string(Exposure::Region))
                    .col(integer(Exposure::IntervalNumber))
                    .col(integer(Exposure::IntervalCount))
                    .col(big_integer(Exposure::CreatedAt))
                    .col(boolean(Exposure::LocalProvenance).default(true))
                    .col(string_null(Exposure::SyncId))
                    .primary_key(Index::create().col(Exposure::ExposureKey))
                    .to_owned(),
            )
            .await?;

        // Export window scans: region + arrival time
        manager
            .create_index(
                Index::create()
                    .name("idx_exposure_region_created_at")
                    .table(Exposure::Table)
                    .col(Exposure::Region)
                    .col(Exposure::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Exposure::Table).if_exists().to_owned())
            .await
    }
}
