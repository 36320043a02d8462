mod access_config;
mod export_batch;
mod export_file;
mod exposure;
mod federation;
mod region;

pub use access_config::{AccessConfig, Publish, RegionAuthorizationError, verify_regions};
pub use export_batch::{ExportBatch, ExportBatchStatus, ExportWindow};
pub use export_file::{
    EXPORT_FILE_HEADER, ExportFileError, TemporaryExposureKey, TemporaryExposureKeyExport,
    decode_export_file, encode_export_file,
};
pub use exposure::Exposure;
pub use federation::{FederationQuery, FederationSync};
pub use region::{normalize_region, parse_region_list};
