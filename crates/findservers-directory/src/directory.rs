//! Facade handed to whatever serves reads and refresh triggers.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheInfo, CacheStore};
use crate::config::DirectoryConfig;
use crate::error::{FetchResult, RefreshError};
use crate::fetcher::{HttpShardFetcher, ShardSource};
use crate::filter::AggregationFilter;
use crate::listing::Snapshot;
use crate::scheduler::{RefreshReport, RefreshScheduler, RefreshStats};
use crate::store::SnapshotBackend;

/// Cheap to clone; all clones share one cache and one scheduler.
#[derive(Debug, Clone)]
pub struct Directory {
    cache: Arc<CacheStore>,
    scheduler: Arc<RefreshScheduler>,
}

impl Directory {
    /// Build a directory that queries the configured upstream over HTTP.
    pub fn from_config(
        config: DirectoryConfig,
        backend: Option<Arc<dyn SnapshotBackend>>,
    ) -> FetchResult<Self> {
        let fetcher = HttpShardFetcher::new(config.upstream.clone())?;
        Ok(Self::with_source(Arc::new(fetcher), config, backend))
    }

    /// Build a directory around any shard source.
    pub fn with_source(
        source: Arc<dyn ShardSource>,
        config: DirectoryConfig,
        backend: Option<Arc<dyn SnapshotBackend>>,
    ) -> Self {
        let ttl = config.refresh.snapshot_ttl;
        let cache = Arc::new(match backend {
            Some(backend) => CacheStore::with_backend(backend, ttl),
            None => CacheStore::new(ttl),
        });

        let scheduler = Arc::new(RefreshScheduler::new(
            source,
            AggregationFilter::new(config.filter),
            Arc::clone(&cache),
            config.refresh,
            config.upstream.shards,
            config.upstream.concurrency,
        ));

        Self { cache, scheduler }
    }

    /// Current snapshot; `None` until something has been published or restored.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cache.read()
    }

    /// Restore the durable snapshot if the cache is still cold.
    pub async fn warm_start(&self) -> bool {
        self.cache.load_from_durable().await
    }

    /// Run a cycle now and wait for its result.
    pub async fn trigger_refresh(&self) -> Result<RefreshReport, RefreshError> {
        self.scheduler.run_cycle().await
    }

    /// Run a cycle in the background and return immediately.
    pub fn spawn_refresh(&self) -> JoinHandle<Result<RefreshReport, RefreshError>> {
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(async move { scheduler.run_cycle().await })
    }

    /// Start the interval-driven refresh loop.
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.scheduler).spawn(cancel)
    }

    pub fn info(&self) -> CacheInfo {
        self.cache.info()
    }

    pub fn stats(&self) -> RefreshStats {
        self.scheduler.stats()
    }
}
