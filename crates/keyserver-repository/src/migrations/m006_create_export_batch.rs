use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, integer, pk_auto, string, string_null},
    sea_query,
};

#[derive(Iden)]
enum ExportBatch {
    Table,
    BatchId,
    Region,
    StartTimestamp,
    EndTimestamp,
    BatchNum,
    BatchSize,
    MaxRecords,
    Status,
    LeaseExpires,
    Filename,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExportBatch::Table)
                    .if_not_exists()
                    .col(pk_auto(ExportBatch::BatchId))
                    .col(string(ExportBatch::Region))
                    .col(big_integer(ExportBatch::StartTimestamp))
                    .col(big_integer(ExportBatch::EndTimestamp))
                    .col(integer(ExportBatch::BatchNum))
                    .col(integer(ExportBatch::BatchSize))
                    .col(integer(ExportBatch::MaxRecords))
                    .col(string(ExportBatch::Status))
                    // Unix milliseconds, only meaningful while IN_PROGRESS
                    .col(big_integer(ExportBatch::LeaseExpires).default(0))
                    .col(string_null(ExportBatch::Filename))
                    .col(big_integer(ExportBatch::CreatedAt))
                    .col(big_integer(ExportBatch::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // One work item per (region, window, position); the controller relies
        // on this to make re-runs insert nothing.
        manager
            .create_index(
                Index::create()
                    .name("idx_export_batch_position")
                    .table(ExportBatch::Table)
                    .col(ExportBatch::Region)
                    .col(ExportBatch::StartTimestamp)
                    .col(ExportBatch::EndTimestamp)
                    .col(ExportBatch::BatchNum)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_export_batch_status")
                    .table(ExportBatch::Table)
                    .col(ExportBatch::Status)
                    .col(ExportBatch::BatchId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ExportBatch::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
