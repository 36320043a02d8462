use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;

use crate::services::{ExportBatcher, ExportWorker};

#[derive(Clone)]
pub(crate) struct HttpApiDeps {
    pub(crate) export_batcher: Arc<ExportBatcher>,
    pub(crate) export_worker: Arc<ExportWorker>,
    /// Upper bound for one scheduler-triggered invocation.
    pub(crate) request_timeout: Duration,
}

#[derive(Clone)]
pub(crate) struct CreateBatchesHttpApiControllerDeps {
    pub(crate) export_batcher: Arc<ExportBatcher>,
    pub(crate) request_timeout: Duration,
}

impl FromRef<HttpApiDeps> for CreateBatchesHttpApiControllerDeps {
    fn from_ref(input: &HttpApiDeps) -> Self {
        Self {
            export_batcher: Arc::clone(&input.export_batcher),
            request_timeout: input.request_timeout,
        }
    }
}

#[derive(Clone)]
pub(crate) struct CreateFilesHttpApiControllerDeps {
    pub(crate) export_worker: Arc<ExportWorker>,
    pub(crate) request_timeout: Duration,
}

impl FromRef<HttpApiDeps> for CreateFilesHttpApiControllerDeps {
    fn from_ref(input: &HttpApiDeps) -> Self {
        Self {
            export_worker: Arc::clone(&input.export_worker),
            request_timeout: input.request_timeout,
        }
    }
}
