use sea_orm_migration::{
    async_trait::async_trait,
    prelude::{DbErr, DeriveMigrationName, Iden, Index, MigrationTrait, SchemaManager, Table},
    schema::{big_integer, string},
    sea_query,
};

#[derive(Iden)]
enum Lock {
    Table,
    LockId,
    Expires,
}

#[derive(DeriveMigrationName)]
pub(crate) struct Migration;

#[async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Lock::Table)
                    .if_not_exists()
                    .col(string(Lock::LockId))
                    // Unix milliseconds
                    .col(big_integer(Lock::Expires))
                    .primary_key(Index::create().col(Lock::LockId))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Lock::Table).if_exists().to_owned())
            .await
    }
}
