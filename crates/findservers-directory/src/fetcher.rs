//! Shard queries against the upstream server directory.
//!
//! [`ShardSource`] is the seam between the refresh cycle and the network:
//! it never fails, it returns an empty list for a shard that could not be
//! fetched. [`HttpShardFetcher`] is the production implementation; tests and
//! offline tooling plug in their own sources.
//!
//! Shards have no data dependency on each other, so [`fetch_all`] runs them
//! with a bounded number in flight while keeping the configured shard order
//! in its output.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use std::sync::{Arc, Once};
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{FetchError, FetchResult};
use crate::filter::ShardBatch;
use crate::listing::RawListing;
use crate::shard::Shard;

/// Install the ring crypto provider for rustls once per process.
///
/// reqwest is built without a bundled provider, so one has to be installed
/// before the first TLS client is constructed.
pub(crate) fn ensure_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Another component may already have installed one
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Source of raw listings for one shard.
#[async_trait]
pub trait ShardSource: Send + Sync {
    /// Never fails; an unreachable shard yields an empty list.
    async fn fetch(&self, shard: Shard) -> Vec<RawListing>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    response: ResponseBody,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    servers: Vec<RawListing>,
}

/// Upstream directory client with per-shard retries.
#[derive(Debug, Clone)]
pub struct HttpShardFetcher {
    client: Client,
    endpoint: Url,
    config: UpstreamConfig,
}

impl HttpShardFetcher {
    pub fn new(config: UpstreamConfig) -> FetchResult<Self> {
        ensure_crypto_provider();

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| FetchError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(config.concurrency.max(1))
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .tcp_nodelay(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .user_agent(concat!("findservers/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Request URL for one shard.
    pub fn shard_url(&self, shard: Shard) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("key", &self.config.api_key)
            .append_pair("filter", &self.config.filter_for(shard))
            .append_pair("limit", &self.config.limit.to_string());
        url
    }

    /// One attempt, no retries.
    pub async fn fetch_once(&self, shard: Shard) -> FetchResult<Vec<RawListing>> {
        let response = self
            .client
            .get(self.shard_url(shard))
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("{shard}: status {status}");

        match status {
            s if s.is_success() => {
                let body = response.bytes().await?;
                let envelope: Envelope = serde_json::from_slice(&body)?;
                Ok(envelope.response.servers)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
                retry_after: retry_after(response.headers()),
            }),
            status => Err(FetchError::HttpStatus(status)),
        }
    }
}

#[async_trait]
impl ShardSource for HttpShardFetcher {
    async fn fetch(&self, shard: Shard) -> Vec<RawListing> {
        let label = shard.to_string();
        let listings = self
            .config
            .retry_policy
            .run(&label, |_| self.fetch_once(shard))
            .await;
        tracing::debug!("{shard}: {} raw listings", listings.len());
        listings
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Fetch every shard with at most `concurrency` queries in flight.
///
/// Output order follows `shards`, regardless of completion order.
pub async fn fetch_all(
    source: Arc<dyn ShardSource>,
    shards: &[Shard],
    concurrency: usize,
) -> Vec<ShardBatch> {
    stream::iter(shards.iter().copied())
        .map(|shard| {
            let source = Arc::clone(&source);
            async move { ShardBatch::new(shard, source.fetch(shard).await) }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
