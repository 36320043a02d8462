use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::join_all;
use keyserver_blob_store::BlobStore;
use keyserver_domain::{ExportBatch, TemporaryExposureKeyExport, encode_export_file};
use keyserver_observability::{record_export_file, record_task_run};
use keyserver_repository::{ExportBatchRepository, ExposureRepository, RepositoryManager};

use super::ExportError;
use crate::config::ExportConfig;

/// Worker step of the export pipeline.
pub(crate) struct ExportWorker {
    export_batch_repository: ExportBatchRepository,
    exposure_repository: ExposureRepository,
    blob_store: Arc<dyn BlobStore>,
    export_bucket: String,
    tmp_export_bucket: String,
    concurrency: usize,
    lease: Duration,
}

struct PublishedFile {
    keys: usize,
    bytes: usize,
}

impl ExportWorker {
    pub(crate) fn new(
        repositories: &RepositoryManager,
        blob_store: Arc<dyn BlobStore>,
        config: &ExportConfig,
    ) -> Self {
        Self {
            export_batch_repository: repositories.export_batch_repository(),
            exposure_repository: repositories.exposure_repository(),
            blob_store,
            export_bucket: config.export_bucket.clone(),
            tmp_export_bucket: config.tmp_export_bucket.clone(),
            concurrency: config.worker_concurrency.max(1),
            lease: config.lease,
        }
    }

    /// Publishes claimable work items until none are left.
    ///
    /// Items are claimed `concurrency` at a time and processed in parallel.
    /// After a round with a failure the remaining items are left for the next
    /// invocation and the first error is returned.
    #[tracing::instrument(name = "create_files", skip(self))]
    pub(crate) async fn create_files(&self) -> Result<u64, ExportError> {
        let started = Instant::now();
        let result = self.drain().await;

        let status = if result.is_ok() { "ok" } else { "error" };
        record_task_run("create_files", status, started.elapsed());
        result
    }

    async fn drain(&self) -> Result<u64, ExportError> {
        let mut published = 0;
        loop {
            let mut claimed = Vec::with_capacity(self.concurrency);
            while claimed.len() < self.concurrency {
                match self.export_batch_repository.claim_next(self.lease).await? {
                    Some(batch) => claimed.push(batch),
                    None => break,
                }
            }
            if claimed.is_empty() {
                break;
            }
            let exhausted = claimed.len() < self.concurrency;

            let results = join_all(claimed.iter().map(|batch| self.publish(batch))).await;
            let mut first_error = None;
            for result in results {
                match result {
                    Ok(()) => published += 1,
                    Err(error) => {
                        first_error.get_or_insert(error);
                    }
                }
            }
            if let Some(error) = first_error {
                tracing::warn!(published, "Stopping after failed export file");
                return Err(error);
            }
            if exhausted {
                break;
            }
        }

        tracing::info!(published, "Export files published");
        Ok(published)
    }

    async fn publish(&self, batch: &ExportBatch) -> Result<(), ExportError> {
        let started = Instant::now();
        match self.write_file(batch).await {
            Ok(file) => {
                record_export_file(
                    &batch.region,
                    "published",
                    started.elapsed(),
                    file.keys,
                    file.bytes,
                );
                tracing::debug!(
                    batch_id = batch.batch_id,
                    region = %batch.region,
                    batch_num = batch.batch_num,
                    batch_size = batch.batch_size,
                    keys = file.keys,
                    "Published export file"
                );
                Ok(())
            }
            Err(error) => {
                record_export_file(&batch.region, "failed", started.elapsed(), 0, 0);
                tracing::error!(
                    batch_id = batch.batch_id,
                    region = %batch.region,
                    error = %error,
                    "Failed to publish export file"
                );
                if let Err(mark_error) = self.export_batch_repository.mark_failed(batch.batch_id).await
                {
                    tracing::warn!(
                        batch_id = batch.batch_id,
                        error = %mark_error,
                        "Failed to mark export batch as failed; it is retried once its lease expires"
                    );
                }
                Err(error)
            }
        }
    }

    async fn write_file(&self, batch: &ExportBatch) -> Result<PublishedFile, ExportError> {
        let (data, keys) = self.render(batch).await?;
        let name = batch.object_name();

        self.blob_store
            .put(&self.tmp_export_bucket, &name, &data)
            .await?;
        self.blob_store
            .promote(&self.tmp_export_bucket, &self.export_bucket, &name)
            .await?;
        self.export_batch_repository
            .mark_published(batch.batch_id, &name)
            .await?;

        Ok(PublishedFile {
            keys,
            bytes: data.len(),
        })
    }

    /// Encoded export file for `batch` and the number of keys in it.
    async fn render(&self, batch: &ExportBatch) -> Result<(Vec<u8>, usize), ExportError> {
        let exposures = self
            .exposure_repository
            .find_for_batch(
                &batch.region,
                &batch.window,
                batch.record_offset(),
                u64::try_from(batch.max_records).unwrap_or(0),
            )
            .await?;

        let export = TemporaryExposureKeyExport::from_exposures(
            batch.window,
            &batch.region,
            batch.batch_num,
            batch.batch_size,
            &exposures,
        );
        Ok((encode_export_file(&export), exposures.len()))
    }
}
