//! Configuration structures for the refresh-and-cache engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::filter::FilterRules;
use crate::retry::RetryPolicy;
use crate::shard::Shard;

/// Default upstream listing endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://api.steampowered.com/IGameServersService/GetServerList/v1/";

/// Upstream directory query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Listing endpoint URL
    pub endpoint: String,

    /// API credential sent as the `key` query parameter
    pub api_key: String,

    /// Application whose dedicated servers are listed
    pub app_id: u32,

    /// Result cap for one shard query
    pub limit: u32,

    /// Shards queried by every refresh cycle, in merge order
    pub shards: Vec<Shard>,

    /// Upper bound for one attempt, including reading the body
    pub request_timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Shard queries in flight at once
    pub concurrency: usize,

    /// Retry policy applied per shard
    pub retry_policy: RetryPolicy,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            app_id: 730,
            limit: 10_000,
            shards: Shard::DEFAULT_SET.to_vec(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            concurrency: 4,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Upstream `filter` parameter for one shard.
    pub fn filter_for(&self, shard: Shard) -> String {
        format!(
            "\\appid\\{}\\dedicated\\1{}",
            self.app_id,
            shard.filter_fragment()
        )
    }
}

/// Refresh cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Time between scheduled cycles
    pub interval: Duration,

    /// A cycle publishes only when it produces MORE than this many listings
    pub min_listings: usize,

    /// Lifetime of a published snapshot in the durable backend
    pub snapshot_ttl: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            min_listings: 10,
            snapshot_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// Everything the engine needs to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub upstream: UpstreamConfig,
    pub filter: FilterRules,
    pub refresh: RefreshConfig,
}
