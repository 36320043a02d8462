use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct CreateBatchesResponse {
    pub batches_created: u64,
}

impl CreateBatchesResponse {
    pub(crate) fn new(batches_created: u64) -> Self {
        Self { batches_created }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateFilesResponse {
    pub files_published: u64,
}

impl CreateFilesResponse {
    pub(crate) fn new(files_published: u64) -> Self {
        Self { files_published }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
