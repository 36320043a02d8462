mod bootstrap;
mod config;
mod controllers;
mod error;
mod logger;
mod runtime;
mod services;

use std::{process::ExitCode, sync::Arc};

use keyserver_repository::RepositoryManager;
pub use services::{
    FederationPuller, FederationSyncError, FederationSyncService, PullError, SyncOutcome,
};

/// Runs the export server until SIGINT or SIGTERM.
pub async fn run() -> ExitCode {
    dotenvy::dotenv().ok();

    let bootstrap::CoreBootstrap { config, services } = match bootstrap::build_core().await {
        Ok(core) => core,
        Err(error) => {
            // The logger may not be installed yet.
            eprintln!("Failed to start export server: {}", error);
            tracing::error!(error = %error, "Failed to start export server");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        period = %humantime::format_duration(config.export.period),
        max_records = config.export.max_records,
        "Export server starting"
    );

    let controllers = bootstrap::build_controllers(&config, &services);
    runtime::run(controllers.http_router).await;
    ExitCode::SUCCESS
}

/// Runs one sync of `query_id` using the server's configuration.
///
/// `config_path` is an optional extra TOML file layered like `-c`; database
/// settings, the sync lock TTL and logging come from the same sources as the
/// export server.
pub async fn sync_federation_query(
    config_path: Option<&str>,
    puller: Arc<dyn FederationPuller>,
    query_id: &str,
) -> Result<SyncOutcome, FederationSyncError> {
    dotenvy::dotenv().ok();

    let config = config::load_configuration(config_path, |name| std::env::var(name).ok())
        .map_err(|error| FederationSyncError::Setup(error.to_string()))?;
    logger::initialize(&config.logger, &config.telemetry);

    let repositories = RepositoryManager::connect(&config.database).await?;
    FederationSyncService::new(&repositories, puller, config.federation.lock_ttl)
        .sync(query_id)
        .await
}
