use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, big_integer_null, integer_null, string},
    sea_query,
};

#[derive(Iden)]
enum FederationSync {
    Table,
    SyncId,
    QueryId,
    Started,
    Completed,
    Insertions,
    MaxTimestamp,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FederationSync::Table)
                    .if_not_exists()
                    .col(string(FederationSync::SyncId))
                    .col(string(FederationSync::QueryId))
                    .col(big_integer(FederationSync::Started))
                    .col(big_integer_null(FederationSync::Completed))
                    .col(integer_null(FederationSync::Insertions))
                    .col(big_integer_null(FederationSync::MaxTimestamp))
                    .primary_key(Index::create().col(FederationSync::SyncId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_federation_sync_query")
                    .table(FederationSync::Table)
                    .col(FederationSync::QueryId)
                    .col(FederationSync::Started)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(FederationSync::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
