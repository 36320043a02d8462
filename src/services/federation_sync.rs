use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyserver_domain::{Exposure, FederationQuery, normalize_region};
use keyserver_observability::{record_federation_sync, record_lock_attempt};
use keyserver_repository::{
    ExposureRepository, FederationRepository, LockRepository, RepositoryError, RepositoryManager,
};
use thiserror::Error;

pub type PullError = Box<dyn std::error::Error + Send + Sync>;

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Transport that fetches exposures from a federation peer.
#[async_trait]
pub trait FederationPuller: Send + Sync {
    /// Exposures the peer published after `query.last_timestamp`, carrying
    /// the peer's own `created_at`.
    async fn pull(&self, query: &FederationQuery) -> Result<Vec<Exposure>, PullError>;
}

#[derive(Error, Debug)]
pub enum FederationSyncError {
    /// Configuration or connection problem before the sync could start.
    #[error("Failed to set up federation sync: {0}")]
    Setup(String),

    #[error("Sync of query {0} already in progress")]
    Locked(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Failed to pull from {server_addr}: {source}")]
    Pull {
        server_addr: String,
        #[source]
        source: PullError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub sync_id: String,
    pub pulled: usize,
    pub inserted: u32,
    /// Cursor handed to finalize; unchanged from the query when nothing was
    /// pulled.
    pub max_timestamp: DateTime<Utc>,
}

/// Runs one incremental pull for a federation query.
pub struct FederationSyncService {
    lock_repository: LockRepository,
    federation_repository: FederationRepository,
    exposure_repository: ExposureRepository,
    puller: Arc<dyn FederationPuller>,
    lock_ttl: Duration,
    clock: Clock,
}

fn lock_id(query_id: &str) -> String {
    format!("query_{}", query_id)
}

impl FederationSyncService {
    pub fn new(
        repositories: &RepositoryManager,
        puller: Arc<dyn FederationPuller>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            lock_repository: repositories.lock_repository(),
            federation_repository: repositories.federation_repository(),
            exposure_repository: repositories.exposure_repository(),
            puller,
            lock_ttl,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[tracing::instrument(name = "federation_sync", skip(self))]
    pub async fn sync(&self, query_id: &str) -> Result<SyncOutcome, FederationSyncError> {
        let started = Instant::now();
        let lock_id = lock_id(query_id);

        let guard = match self.lock_repository.acquire(&lock_id, self.lock_ttl).await {
            Ok(guard) => {
                record_lock_attempt(&lock_id, "acquired");
                guard
            }
            Err(RepositoryError::AlreadyLocked(_)) => {
                record_lock_attempt(&lock_id, "locked");
                tracing::info!(query_id, "Sync already running, skipping");
                return Err(FederationSyncError::Locked(query_id.to_string()));
            }
            Err(error) => {
                record_lock_attempt(&lock_id, "error");
                return Err(error.into());
            }
        };

        let result = self.pull_and_store(query_id).await;

        if let Err(error) = self.lock_repository.release(guard).await {
            tracing::warn!(lock_id = %lock_id, error = %error, "Failed to release lock");
        }

        match &result {
            Ok(outcome) => record_federation_sync(
                query_id,
                "ok",
                started.elapsed(),
                u64::from(outcome.inserted),
            ),
            Err(_) => record_federation_sync(query_id, "error", started.elapsed(), 0),
        }
        result
    }

    async fn pull_and_store(&self, query_id: &str) -> Result<SyncOutcome, FederationSyncError> {
        let query = self.federation_repository.get_query(query_id).await?;
        let started_at = (self.clock)();
        let (sync_id, handle) = self.federation_repository.start_sync(&query, started_at).await?;

        let pulled = match self.puller.pull(&query).await {
            Ok(pulled) => pulled,
            Err(source) => {
                // The sync row stays incomplete as a record of the failed attempt.
                drop(handle);
                return Err(FederationSyncError::Pull {
                    server_addr: query.server_addr,
                    source,
                });
            }
        };

        let max_timestamp = pulled
            .iter()
            .map(|exposure| exposure.created_at)
            .max()
            .unwrap_or(query.last_timestamp);

        // Stamped right before the insert. The export controller leaves a
        // window open for `max_ingest_delay` after it ends, which covers the
        // gap between this stamp and the commit.
        let ingested_at = (self.clock)();
        let exposures: Vec<Exposure> = pulled
            .iter()
            .filter(|exposure| region_selected(&query, &exposure.region))
            .map(|exposure| Exposure {
                region: normalize_region(&exposure.region),
                created_at: ingested_at,
                local_provenance: false,
                sync_id: Some(sync_id.clone()),
                ..exposure.clone()
            })
            .collect();

        let inserted = self.exposure_repository.insert_exposures(&exposures).await?;
        let inserted = u32::try_from(inserted).unwrap_or(u32::MAX);

        self.federation_repository
            .finalize_sync(handle, max_timestamp, inserted)
            .await?;

        Ok(SyncOutcome {
            sync_id,
            pulled: pulled.len(),
            inserted,
            max_timestamp,
        })
    }
}

/// Whether `region` passes the query's include and exclude lists. An empty
/// include list selects every region.
fn region_selected(query: &FederationQuery, region: &str) -> bool {
    let region = normalize_region(region);
    let included = query.include_regions.is_empty()
        || query.include_regions.iter().any(|r| normalize_region(r) == region);
    included && !query.exclude_regions.iter().any(|r| normalize_region(r) == region)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    use keyserver_domain::ExportWindow;
    use tokio::sync::Mutex;

    use super::*;
    use crate::{config::ExportConfig, services::ExportBatcher};

    struct FakePuller {
        responses: Mutex<Vec<Result<Vec<Exposure>, PullError>>>,
        seen_cursors: Mutex<Vec<DateTime<Utc>>>,
    }

    impl FakePuller {
        fn new(responses: Vec<Result<Vec<Exposure>, PullError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                seen_cursors: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FederationPuller for FakePuller {
        async fn pull(&self, query: &FederationQuery) -> Result<Vec<Exposure>, PullError> {
            self.seen_cursors.lock().await.push(query.last_timestamp);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Ok(Vec::new());
            }
            responses.remove(0)
        }
    }

    fn ts(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn remote(key: u8, region: &str, created_at: i64) -> Exposure {
        Exposure {
            exposure_key: vec![key; 16],
            transmission_risk: 3,
            app_package_name: "com.peer.app".to_string(),
            region: region.to_string(),
            interval_number: 2_650_000,
            interval_count: 144,
            created_at: ts(created_at),
            local_provenance: true,
            sync_id: None,
        }
    }

    fn query(include: &[&str], exclude: &[&str]) -> FederationQuery {
        FederationQuery {
            query_id: "peer-a".to_string(),
            server_addr: "peer.example.org:443".to_string(),
            include_regions: include.iter().map(|r| r.to_string()).collect(),
            exclude_regions: exclude.iter().map(|r| r.to_string()).collect(),
            last_timestamp: ts(1_000),
        }
    }

    async fn setup(
        query: FederationQuery,
        puller: Arc<FakePuller>,
    ) -> (RepositoryManager, FederationSyncService) {
        let repositories = RepositoryManager::connect_in_memory().await.unwrap();
        repositories
            .federation_repository()
            .add_query(&query)
            .await
            .unwrap();
        let service =
            FederationSyncService::new(&repositories, puller, Duration::from_secs(60));
        (repositories, service)
    }

    async fn stored(repositories: &RepositoryManager, region: &str) -> Vec<Exposure> {
        let everything = ExportWindow::new(ts(0), Utc::now() + chrono::Duration::hours(1));
        repositories
            .exposure_repository()
            .find_for_batch(region, &everything, 0, 100)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_stores_exposures_and_advances_cursor() {
        let puller = FakePuller::new(vec![Ok(vec![
            remote(1, "us", 1_500),
            remote(2, "US", 1_800),
        ])]);
        let (repositories, service) = setup(query(&[], &[]), puller.clone()).await;

        let outcome = service.sync("peer-a").await.unwrap();
        assert_eq!(outcome.pulled, 2);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.max_timestamp, ts(1_800));

        let exposures = stored(&repositories, "US").await;
        assert_eq!(exposures.len(), 2);
        assert!(exposures.iter().all(|e| !e.local_provenance));
        assert!(
            exposures
                .iter()
                .all(|e| e.sync_id.as_deref() == Some(outcome.sync_id.as_str()))
        );
        assert!(exposures.iter().all(|e| e.created_at > ts(1_800)));

        let federation = repositories.federation_repository();
        assert_eq!(
            federation.get_query("peer-a").await.unwrap().last_timestamp,
            ts(1_800)
        );
        let sync = federation.get_sync(&outcome.sync_id).await.unwrap();
        assert!(sync.is_completed());
        assert_eq!(sync.insertions, Some(2));
        assert_eq!(sync.max_timestamp, Some(ts(1_800)));

        service.sync("peer-a").await.unwrap();
        assert_eq!(*puller.seen_cursors.lock().await, vec![ts(1_000), ts(1_800)]);
    }

    #[tokio::test]
    async fn test_empty_pull_keeps_cursor() {
        let (repositories, service) = setup(query(&[], &[]), FakePuller::new(vec![])).await;

        let outcome = service.sync("peer-a").await.unwrap();
        assert_eq!(outcome.inserted, 0);
        assert_eq!(outcome.max_timestamp, ts(1_000));

        let federation = repositories.federation_repository();
        assert_eq!(
            federation.get_query("peer-a").await.unwrap().last_timestamp,
            ts(1_000)
        );
        assert_eq!(
            federation.get_sync(&outcome.sync_id).await.unwrap().insertions,
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_region_filters_apply() {
        let puller = FakePuller::new(vec![Ok(vec![
            remote(1, "US", 1_100),
            remote(2, "CA", 1_200),
            remote(3, "MX", 1_300),
        ])]);
        let (repositories, service) = setup(query(&["us", "ca"], &["CA"]), puller).await;

        let outcome = service.sync("peer-a").await.unwrap();
        assert_eq!(outcome.pulled, 3);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(stored(&repositories, "US").await.len(), 1);
        assert!(stored(&repositories, "CA").await.is_empty());
        assert!(stored(&repositories, "MX").await.is_empty());
    }

    #[tokio::test]
    async fn test_already_stored_keys_do_not_count() {
        let puller = FakePuller::new(vec![
            Ok(vec![remote(1, "US", 1_100)]),
            Ok(vec![remote(1, "US", 1_100)]),
        ]);
        let (repositories, service) = setup(query(&[], &[]), puller).await;

        service.sync("peer-a").await.unwrap();
        let second = service.sync("peer-a").await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(stored(&repositories, "US").await.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_failure_leaves_cursor_and_releases_lock() {
        let puller = FakePuller::new(vec![Err("connection refused".into())]);
        let (repositories, service) = setup(query(&[], &[]), puller).await;

        assert!(matches!(
            service.sync("peer-a").await,
            Err(FederationSyncError::Pull { .. })
        ));
        assert_eq!(
            repositories
                .federation_repository()
                .get_query("peer-a")
                .await
                .unwrap()
                .last_timestamp,
            ts(1_000)
        );
        assert!(service.sync("peer-a").await.is_ok());
    }

    #[tokio::test]
    async fn test_held_query_lock_fails_fast() {
        let (repositories, service) = setup(query(&[], &[]), FakePuller::new(vec![])).await;
        let _held = repositories
            .lock_repository()
            .acquire("query_peer-a", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(matches!(
            service.sync("peer-a").await,
            Err(FederationSyncError::Locked(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_query_is_not_found() {
        let (_repositories, service) = setup(query(&[], &[]), FakePuller::new(vec![])).await;

        assert!(matches!(
            service.sync("missing").await,
            Err(FederationSyncError::Repository(RepositoryError::NotFound(_)))
        ));
    }

    const HOUR: i64 = 3_600;

    /// Crosses a window boundary and runs the export controller while the
    /// pull is still in flight.
    struct BoundaryCrossingPuller {
        clock: Arc<AtomicI64>,
        batcher: ExportBatcher,
        created_mid_pull: AtomicU64,
    }

    #[async_trait]
    impl FederationPuller for BoundaryCrossingPuller {
        async fn pull(&self, _query: &FederationQuery) -> Result<Vec<Exposure>, PullError> {
            self.clock.store(10 * HOUR + 5, Ordering::SeqCst);
            let created = self
                .batcher
                .create_batches_at(ts(10 * HOUR + 5))
                .await
                .map_err(|e| -> PullError { e.to_string().into() })?;
            self.created_mid_pull.store(created, Ordering::SeqCst);
            Ok(vec![remote(9, "US", 1_500)])
        }
    }

    fn export_config() -> ExportConfig {
        ExportConfig {
            period: Duration::from_secs(HOUR as u64),
            create_batches_timeout: Duration::from_secs(60),
            export_bucket: "exports".to_string(),
            tmp_export_bucket: "exports-tmp".to_string(),
            max_records: 3,
            worker_concurrency: 1,
            lease: Duration::from_secs(60),
            max_ingest_delay: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_keys_pulled_across_a_window_boundary_are_batched() {
        let repositories = RepositoryManager::connect_in_memory().await.unwrap();
        repositories
            .federation_repository()
            .add_query(&query(&[], &[]))
            .await
            .unwrap();
        let local = Exposure {
            local_provenance: true,
            ..remote(1, "US", 10 * HOUR - 30)
        };
        repositories
            .exposure_repository()
            .insert_exposures(&[local])
            .await
            .unwrap();

        let clock = Arc::new(AtomicI64::new(10 * HOUR - 30));
        let puller = Arc::new(BoundaryCrossingPuller {
            clock: clock.clone(),
            batcher: ExportBatcher::new(&repositories, &export_config()),
            created_mid_pull: AtomicU64::new(u64::MAX),
        });
        let service =
            FederationSyncService::new(&repositories, puller.clone(), Duration::from_secs(60))
                .with_clock(Arc::new(move || ts(clock.load(Ordering::SeqCst))));

        let outcome = service.sync("peer-a").await.unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(puller.created_mid_pull.load(Ordering::SeqCst), 0);

        let batcher = ExportBatcher::new(&repositories, &export_config());
        assert_eq!(batcher.create_batches_at(ts(11 * HOUR + 120)).await.unwrap(), 2);

        for (start, key) in [(9 * HOUR, 1u8), (10 * HOUR, 9)] {
            let window = ExportWindow::new(ts(start), ts(start + HOUR));
            let planned = repositories
                .export_batch_repository()
                .find_by_window(&window)
                .await
                .unwrap();
            assert_eq!(planned.len(), 1, "window starting at {start}");

            let keys: Vec<u8> = repositories
                .exposure_repository()
                .find_for_batch("US", &window, 0, 100)
                .await
                .unwrap()
                .iter()
                .map(|e| e.exposure_key[0])
                .collect();
            assert_eq!(keys, vec![key], "window starting at {start}");
        }
    }

    #[test]
    fn test_region_selection() {
        let q = query(&[], &["mx"]);
        assert!(region_selected(&q, "US"));
        assert!(!region_selected(&q, " MX "));

        let q = query(&["US"], &[]);
        assert!(region_selected(&q, "us"));
        assert!(!region_selected(&q, "CA"));
    }
}
