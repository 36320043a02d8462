use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("Object not found: {bucket}/{name}")]
    NotFound { bucket: String, name: String },

    #[error("Invalid object name: {0:?}")]
    InvalidName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BlobStoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
