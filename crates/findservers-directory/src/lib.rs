//! Refresh-and-cache engine for a live game server directory
//!
//! The upstream listing API is slow, rate limited and caps every response,
//! so one logical query is split into region shards. A background refresh
//! cycle queries every shard, merges and cleans the results, and publishes
//! one immutable [`Snapshot`] that any number of readers can hold at once.
//!
//! # Components
//!
//! - [`HttpShardFetcher`] - per-shard upstream queries with bounded retries
//! - [`AggregationFilter`] - merge, exclusion rules, deduplication, normalization
//! - [`CacheStore`] - atomic snapshot slot with an optional durable mirror
//! - [`RefreshScheduler`] - single-flight refresh cycles on a timer or on demand
//! - [`Directory`] - facade over all of the above
//!
//! Durable mirrors implement [`SnapshotBackend`]: [`MemoryBackend`],
//! [`DiskBackend`] and [`HttpBlobBackend`] ship with the crate.
//!
//! # Example
//!
//! ```no_run
//! use findservers_directory::{Directory, DirectoryConfig, UpstreamConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DirectoryConfig {
//!     upstream: UpstreamConfig::with_api_key("my-key"),
//!     ..DirectoryConfig::default()
//! };
//! let directory = Directory::from_config(config, None)?;
//!
//! directory.trigger_refresh().await?;
//! let cancel = CancellationToken::new();
//! let scheduler = directory.start(cancel.clone());
//!
//! if let Some(snapshot) = directory.snapshot() {
//!     println!("{} servers as of {}", snapshot.len(), snapshot.created_at());
//! }
//!
//! cancel.cancel();
//! scheduler.await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cache;
pub mod config;
pub mod directory;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod listing;
pub mod retry;
pub mod scheduler;
pub mod shard;
pub mod store;

pub use cache::{CacheInfo, CacheStore};
pub use config::{DEFAULT_ENDPOINT, DirectoryConfig, RefreshConfig, UpstreamConfig};
pub use directory::Directory;
pub use error::{FetchError, FetchResult, RefreshError, StoreError, StoreResult};
pub use fetcher::{HttpShardFetcher, ShardSource, fetch_all};
pub use filter::{AggregationFilter, Exclusion, FilterRules, FilterStats, Reduction, ShardBatch};
pub use listing::{CleanListing, RawListing, Snapshot};
pub use retry::RetryPolicy;
pub use scheduler::{CycleOutcome, RefreshReport, RefreshScheduler, RefreshState, RefreshStats};
pub use shard::Shard;
pub use store::{
    BlobConfig, DiskBackend, HttpBlobBackend, MemoryBackend, SNAPSHOT_FILE, SNAPSHOT_KEY,
    SnapshotBackend,
};

#[cfg(test)]
pub(crate) mod testing {
    use crate::listing::{CleanListing, RawListing, Snapshot};

    /// Snapshot of `count` valid listings named `server 0..count`.
    pub fn sample_snapshot(count: usize) -> Snapshot {
        let listings = (0..count)
            .map(|i| {
                CleanListing::from_raw(&RawListing {
                    addr: format!("10.0.{}.{}:27015", i / 256, i % 256),
                    name: format!("server {i}"),
                    map: "de_dust2".to_string(),
                    max_players: 32,
                    gametype: "secure".to_string(),
                    ..RawListing::default()
                })
            })
            .collect();
        Snapshot::new(listings)
    }
}
