use sea_orm_migration::{MigrationTrait, MigratorTrait, async_trait::async_trait};

mod m001_create_lock;
mod m002_create_api_config;
mod m003_create_federation_query;
mod m004_create_federation_sync;
mod m005_create_exposure;
mod m006_create_export_batch;

pub(crate) struct Migrator;

#[async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_lock::Migration),
            Box::new(m002_create_api_config::Migration),
            Box::new(m003_create_federation_query::Migration),
            Box::new(m004_create_federation_sync::Migration),
            Box::new(m005_create_exposure::Migration),
            Box::new(m006_create_export_batch::Migration),
        ]
    }
}
