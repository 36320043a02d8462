use std::sync::Arc;

use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;

use crate::config::RepositoryManagerConfig;
use crate::{
    error::RepositoryError,
    migrations::Migrator,
    repositories::{
        access_config_repository::AccessConfigRepository,
        export_batch_repository::ExportBatchRepository, exposure_repository::ExposureRepository,
        federation_repository::FederationRepository, lock_repository::LockRepository,
    },
    store::Store,
};

pub struct RepositoryManager {
    lock_repository: LockRepository,
    access_config_repository: AccessConfigRepository,
    federation_repository: FederationRepository,
    exposure_repository: ExposureRepository,
    export_batch_repository: ExportBatchRepository,
}

impl RepositoryManager {
    /// Connects to Postgres and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if:
    /// - Database connection fails (e.g. database missing, bad credentials)
    /// - Migrations fail
    pub async fn connect(config: &RepositoryManagerConfig) -> Result<Self, RepositoryError> {
        let mut opt = ConnectOptions::new(config.connection_string());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections);

        Self::connect_with_options(opt).await
    }

    /// Private in-memory SQLite database with all migrations applied.
    ///
    /// The pool is pinned to a single connection because every SQLite
    /// in-memory connection is its own database.
    pub async fn connect_in_memory() -> Result<Self, RepositoryError> {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1);

        Self::connect_with_options(opt).await
    }

    pub async fn connect_with_options(mut opt: ConnectOptions) -> Result<Self, RepositoryError> {
        opt.sqlx_logging(true)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        let conn = Arc::new(Database::connect(opt).await?);

        Migrator::up(conn.as_ref(), None).await?;

        let store = Store::new(conn);
        Ok(RepositoryManager {
            lock_repository: LockRepository::new(store.clone()),
            access_config_repository: AccessConfigRepository::new(store.clone()),
            federation_repository: FederationRepository::new(store.clone()),
            exposure_repository: ExposureRepository::new(store.clone()),
            export_batch_repository: ExportBatchRepository::new(store),
        })
    }

    pub fn lock_repository(&self) -> LockRepository {
        self.lock_repository.clone()
    }

    pub fn access_config_repository(&self) -> AccessConfigRepository {
        self.access_config_repository.clone()
    }

    pub fn federation_repository(&self) -> FederationRepository {
        self.federation_repository.clone()
    }

    pub fn exposure_repository(&self) -> ExposureRepository {
        self.exposure_repository.clone()
    }

    pub fn export_batch_repository(&self) -> ExportBatchRepository {
        self.export_batch_repository.clone()
    }
}

#[cfg(test)]
pub(crate) async fn test_manager() -> RepositoryManager {
    RepositoryManager::connect_in_memory()
        .await
        .expect("in-memory database should open")
}
