use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, string, text},
    sea_query,
};

#[derive(Iden)]
enum FederationQuery {
    Table,
    QueryId,
    ServerAddr,
    IncludeRegions,
    ExcludeRegions,
    LastTimestamp,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FederationQuery::Table)
                    .if_not_exists()
                    .col(string(FederationQuery::QueryId))
                    .col(string(FederationQuery::ServerAddr))
                    .col(text(FederationQuery::IncludeRegions))
                    .col(text(FederationQuery::ExcludeRegions))
                    .col(big_integer(FederationQuery::LastTimestamp).default(0))
                    .primary_key(Index::create().col(FederationQuery::QueryId))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(FederationQuery::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
