mod config;
mod config_error;
pub mod error;
mod manager;
mod migrations;
mod models;
mod observability;
mod repositories;
mod store;
mod time;
mod types;

pub use config::{RepositoryManagerConfig, RepositoryManagerConfigRaw};
pub use config_error::ConfigError;
pub use error::RepositoryError;
pub use manager::RepositoryManager;
pub use repositories::{
    access_config_repository::AccessConfigRepository,
    export_batch_repository::ExportBatchRepository,
    exposure_repository::ExposureRepository,
    federation_repository::{FederationRepository, SyncHandle},
    lock_repository::{LockGuard, LockRepository},
};
pub use store::Isolation;
pub use types::{NewExportBatch, RegionCount};
