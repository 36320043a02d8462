use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use keyserver_observability::{record_export_windows_planned, record_lock_attempt, record_task_run};
use keyserver_repository::{
    ExportBatchRepository, ExposureRepository, LockRepository, RepositoryError, RepositoryManager,
};

use super::{
    ExportError,
    planner::plan_batches,
    window::{closed_until, truncate, window_containing},
};
use crate::config::ExportConfig;

pub(crate) const CREATE_BATCHES_LOCK: &str = "create_batches";

/// Controller step of the export pipeline.
pub(crate) struct ExportBatcher {
    lock_repository: LockRepository,
    exposure_repository: ExposureRepository,
    export_batch_repository: ExportBatchRepository,
    period: Duration,
    max_records: u32,
    lock_ttl: Duration,
    max_ingest_delay: Duration,
}

impl ExportBatcher {
    pub(crate) fn new(repositories: &RepositoryManager, config: &ExportConfig) -> Self {
        Self {
            lock_repository: repositories.lock_repository(),
            exposure_repository: repositories.exposure_repository(),
            export_batch_repository: repositories.export_batch_repository(),
            period: config.period,
            max_records: config.max_records,
            lock_ttl: config.create_batches_timeout,
            max_ingest_delay: config.max_ingest_delay,
        }
    }

    /// Creates work items for every closed window that has none yet.
    ///
    /// A window counts as closed once it ended at least `max_ingest_delay`
    /// ago, so inserts stamped inside it have committed before it is planned.
    ///
    /// Fails fast with [`ExportError::Locked`] if another invocation is
    /// already batching.
    #[tracing::instrument(name = "create_batches", skip(self))]
    pub(crate) async fn create_batches(&self) -> Result<u64, ExportError> {
        self.create_batches_at(Utc::now()).await
    }

    pub(crate) async fn create_batches_at(&self, now: DateTime<Utc>) -> Result<u64, ExportError> {
        let started = Instant::now();

        let guard = match self
            .lock_repository
            .acquire(CREATE_BATCHES_LOCK, self.lock_ttl)
            .await
        {
            Ok(guard) => {
                record_lock_attempt(CREATE_BATCHES_LOCK, "acquired");
                guard
            }
            Err(RepositoryError::AlreadyLocked(lock_id)) => {
                record_lock_attempt(CREATE_BATCHES_LOCK, "locked");
                tracing::info!(lock_id = %lock_id, "Batch creation already running, skipping");
                return Err(ExportError::Locked(lock_id));
            }
            Err(error) => {
                record_lock_attempt(CREATE_BATCHES_LOCK, "error");
                return Err(error.into());
            }
        };

        let result = self.plan_closed_windows(now).await;

        if let Err(error) = self.lock_repository.release(guard).await {
            tracing::warn!(
                lock_id = CREATE_BATCHES_LOCK,
                error = %error,
                "Failed to release lock; it will expire on its own"
            );
        }

        let status = if result.is_ok() { "ok" } else { "error" };
        record_task_run("create_batches", status, started.elapsed());
        result
    }

    async fn plan_closed_windows(&self, now: DateTime<Utc>) -> Result<u64, ExportError> {
        let until = closed_until(now, self.period, self.max_ingest_delay)?;

        let mut cursor = match self.export_batch_repository.latest_end_timestamp().await? {
            Some(end) => end,
            None => match self
                .exposure_repository
                .earliest_created_at(DateTime::<Utc>::UNIX_EPOCH, until)
                .await?
            {
                Some(oldest) => truncate(oldest, self.period)?,
                None => {
                    tracing::debug!("No exposures in closed windows");
                    return Ok(0);
                }
            },
        };

        let mut windows = 0;
        let mut created = 0;
        while cursor < until {
            let Some(earliest) = self
                .exposure_repository
                .earliest_created_at(cursor, until)
                .await?
            else {
                break;
            };

            let window = window_containing(cursor, earliest, self.period)?;
            if window.end > until {
                break;
            }

            let counts = self.exposure_repository.count_by_region(&window).await?;
            let plan = plan_batches(window, &counts, self.max_records);
            let inserted = self.export_batch_repository.create_batches(&plan).await?;

            tracing::info!(
                window_start = %window.start,
                window_end = %window.end,
                regions = counts.len(),
                planned = plan.len(),
                inserted,
                "Planned export window"
            );

            windows += 1;
            created += inserted;
            cursor = window.end;
        }

        record_export_windows_planned(windows, created);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use keyserver_domain::{ExportBatchStatus, ExportWindow, Exposure};

    use super::*;

    const HOUR: i64 = 3_600;

    fn config(max_records: u32) -> ExportConfig {
        ExportConfig {
            period: Duration::from_secs(HOUR as u64),
            create_batches_timeout: Duration::from_secs(60),
            export_bucket: "exports".to_string(),
            tmp_export_bucket: "exports-tmp".to_string(),
            max_records,
            worker_concurrency: 2,
            lease: Duration::from_secs(60),
            max_ingest_delay: Duration::from_secs(60),
        }
    }

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn exposure(key: u16, region: &str, created_at: i64) -> Exposure {
        let mut exposure_key = vec![0u8; 16];
        exposure_key[..2].copy_from_slice(&key.to_be_bytes());
        Exposure {
            exposure_key,
            transmission_risk: 1,
            app_package_name: "com.example.pkg".to_string(),
            region: region.to_string(),
            interval_number: 2_650_000,
            interval_count: 144,
            created_at: ts(created_at),
            local_provenance: true,
            sync_id: None,
        }
    }

    async fn setup(max_records: u32) -> (RepositoryManager, ExportBatcher) {
        let repositories = RepositoryManager::connect_in_memory().await.unwrap();
        let batcher = ExportBatcher::new(&repositories, &config(max_records));
        (repositories, batcher)
    }

    #[tokio::test]
    async fn test_no_exposures_creates_nothing() {
        let (_repositories, batcher) = setup(3).await;
        assert_eq!(batcher.create_batches_at(ts(10 * HOUR)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partitions_closed_windows_per_region() {
        let (repositories, batcher) = setup(3).await;
        let mut exposures: Vec<Exposure> = (0..7).map(|i| exposure(i, "US", HOUR + 10)).collect();
        exposures.push(exposure(100, "CA", HOUR + 20));
        exposures.push(exposure(101, "CA", 3 * HOUR + 5));
        // Current, still open window: not batched yet.
        exposures.push(exposure(102, "CA", 5 * HOUR + 5));
        repositories
            .exposure_repository()
            .insert_exposures(&exposures)
            .await
            .unwrap();

        let created = batcher.create_batches_at(ts(5 * HOUR + 30)).await.unwrap();
        assert_eq!(created, 5);

        let batches = repositories.export_batch_repository();
        let first = batches
            .find_by_window(&ExportWindow::new(ts(HOUR), ts(2 * HOUR)))
            .await
            .unwrap();
        let positions: Vec<_> = first
            .iter()
            .map(|b| (b.region.as_str(), b.batch_num, b.batch_size))
            .collect();
        assert_eq!(
            positions,
            vec![("CA", 1, 1), ("US", 1, 3), ("US", 2, 3), ("US", 3, 3)]
        );
        assert!(first.iter().all(|b| b.status == ExportBatchStatus::Created));

        let later = batches
            .find_by_window(&ExportWindow::new(ts(3 * HOUR), ts(4 * HOUR)))
            .await
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(
            batches.latest_end_timestamp().await.unwrap(),
            Some(ts(4 * HOUR))
        );
    }

    #[tokio::test]
    async fn test_rerun_creates_nothing_new() {
        let (repositories, batcher) = setup(3).await;
        repositories
            .exposure_repository()
            .insert_exposures(&[exposure(1, "US", 10)])
            .await
            .unwrap();

        assert_eq!(batcher.create_batches_at(ts(2 * HOUR)).await.unwrap(), 1);
        assert_eq!(batcher.create_batches_at(ts(2 * HOUR)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resumes_after_last_batched_window() {
        let (repositories, batcher) = setup(3).await;
        let exposures = repositories.exposure_repository();
        exposures
            .insert_exposures(&[exposure(1, "US", 10)])
            .await
            .unwrap();
        assert_eq!(batcher.create_batches_at(ts(HOUR + 120)).await.unwrap(), 1);

        exposures
            .insert_exposures(&[exposure(2, "US", 2 * HOUR + 1)])
            .await
            .unwrap();
        assert_eq!(batcher.create_batches_at(ts(3 * HOUR + 120)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recently_closed_window_waits_for_ingest_delay() {
        let (repositories, batcher) = setup(3).await;
        // Stamped just before the boundary; its insert may still be in flight.
        repositories
            .exposure_repository()
            .insert_exposures(&[exposure(1, "US", 2 * HOUR - 10)])
            .await
            .unwrap();

        assert_eq!(batcher.create_batches_at(ts(2 * HOUR + 5)).await.unwrap(), 0);
        assert_eq!(
            repositories
                .export_batch_repository()
                .latest_end_timestamp()
                .await
                .unwrap(),
            None
        );

        repositories
            .exposure_repository()
            .insert_exposures(&[exposure(2, "US", 2 * HOUR - 5)])
            .await
            .unwrap();
        assert_eq!(batcher.create_batches_at(ts(2 * HOUR + 60)).await.unwrap(), 1);

        let planned = repositories
            .export_batch_repository()
            .find_by_window(&ExportWindow::new(ts(HOUR), ts(2 * HOUR)))
            .await
            .unwrap();
        assert_eq!(planned.len(), 1);
    }

    #[tokio::test]
    async fn test_held_lock_fails_fast() {
        let (repositories, batcher) = setup(3).await;
        repositories
            .exposure_repository()
            .insert_exposures(&[exposure(1, "US", 10)])
            .await
            .unwrap();

        let _held = repositories
            .lock_repository()
            .acquire(CREATE_BATCHES_LOCK, Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            batcher.create_batches_at(ts(2 * HOUR)).await,
            Err(ExportError::Locked(_))
        ));
        assert_eq!(
            repositories
                .export_batch_repository()
                .latest_end_timestamp()
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_lock_is_released_after_run() {
        let (repositories, batcher) = setup(3).await;
        batcher.create_batches_at(ts(2 * HOUR)).await.unwrap();

        assert!(
            repositories
                .lock_repository()
                .acquire(CREATE_BATCHES_LOCK, Duration::from_secs(60))
                .await
                .is_ok()
        );
    }
}
