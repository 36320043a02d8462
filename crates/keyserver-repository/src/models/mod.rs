pub(crate) mod api_config;
pub(crate) mod export_batch;
pub(crate) mod exposure;
pub(crate) mod federation_query;
pub(crate) mod federation_sync;
pub(crate) mod lock;
