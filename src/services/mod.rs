pub(crate) mod export;
pub(crate) mod federation_sync;

use std::sync::Arc;

use keyserver_blob_store::BlobStore;
use keyserver_repository::RepositoryManager;

pub(crate) use export::{ExportBatcher, ExportError, ExportWorker};
pub use federation_sync::{
    FederationPuller, FederationSyncError, FederationSyncService, PullError, SyncOutcome,
};

use crate::config::ExportConfig;

/// Container for all initialized services.
pub(crate) struct Services {
    pub export_batcher: Arc<ExportBatcher>,
    pub export_worker: Arc<ExportWorker>,
}

/// Initialize all services.
///
/// Services depend only on the repository manager and the blob store;
/// controllers reach them through their own deps structs.
pub(crate) fn initialize(
    repositories: &RepositoryManager,
    blob_store: Arc<dyn BlobStore>,
    export_config: &ExportConfig,
) -> Services {
    Services {
        export_batcher: Arc::new(ExportBatcher::new(repositories, export_config)),
        export_worker: Arc::new(ExportWorker::new(repositories, blob_store, export_config)),
    }
}
