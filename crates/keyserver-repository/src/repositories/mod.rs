pub(crate) mod access_config_repository;
pub(crate) mod export_batch_repository;
pub(crate) mod exposure_repository;
pub(crate) mod federation_repository;
pub(crate) mod lock_repository;
