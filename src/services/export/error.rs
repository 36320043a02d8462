use keyserver_blob_store::BlobStoreError;
use keyserver_repository::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ExportError {
    /// Another controller invocation holds the batching lock.
    #[error("Export batching already in progress: lock {0} is held")]
    Locked(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),

    #[error("Invalid export window: {0}")]
    Window(String),
}
