use keyserver_blob_store::build_blob_store;
use keyserver_repository::RepositoryManager;

use crate::{
    config::{self, Config},
    controllers::{self, Controllers},
    error::AppError,
    services::{self, Services},
};

pub(crate) struct CoreBootstrap {
    pub(crate) config: Config,
    pub(crate) services: Services,
}

pub(crate) async fn build_core() -> Result<CoreBootstrap, AppError> {
    let config = config::initialize_configuration()?;
    crate::logger::initialize(&config.logger, &config.telemetry);

    let repositories = RepositoryManager::connect(&config.database).await?;
    tracing::info!(
        host = %config.database.host,
        database = %config.database.database,
        "Connected to database"
    );

    let blob_store = build_blob_store(&config.blob_store);
    let services = services::initialize(&repositories, blob_store, &config.export);

    Ok(CoreBootstrap { config, services })
}

pub(crate) fn build_controllers(config: &Config, services: &Services) -> Controllers {
    controllers::initialize(config, services)
}
