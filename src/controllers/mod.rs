pub(crate) mod http_api_controller;

pub(crate) use http_api_controller::router::{HttpApiConfig, HttpApiRouter};

use crate::{config::Config, controllers::http_api_controller::HttpApiDeps, services::Services};

/// Container for all initialized controllers.
pub(crate) struct Controllers {
    pub http_router: HttpApiRouter,
}

/// Initialize all controllers.
pub(crate) fn initialize(config: &Config, services: &Services) -> Controllers {
    let deps = HttpApiDeps {
        export_batcher: services.export_batcher.clone(),
        export_worker: services.export_worker.clone(),
        request_timeout: config.export.create_batches_timeout,
    };

    tracing::info!(
        host = %config.http_api.host,
        port = config.http_api.port,
        "HTTP API configured"
    );

    Controllers {
        http_router: HttpApiRouter::new(&config.http_api, deps),
    }
}
