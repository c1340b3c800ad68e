//! TTL-keyed in-process backend.
//!
//! Stands in for a keyed KV store: the snapshot lives as a serialized blob
//! under [`SNAPSHOT_KEY`](super::SNAPSHOT_KEY) and disappears once its TTL
//! runs out. Useful for tests and single-process deployments that want the
//! same code path as a real durable store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{SNAPSHOT_KEY, SnapshotBackend, decode, encode};
use crate::error::StoreResult;
use crate::listing::Snapshot;

/// Serialized value plus its expiry; `None` never expires.
#[derive(Debug, Clone)]
struct Blob {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Blob {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Blob>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of the stored snapshot, if any.
    ///
    /// A snapshot saved with a TTL too large to represent reports
    /// `Duration::MAX`.
    pub fn ttl(&self) -> Option<Duration> {
        let blob = self.entries.get(SNAPSHOT_KEY)?;
        match blob.expires_at {
            Some(expires) => {
                Some(expires.saturating_duration_since(Instant::now())).filter(|d| !d.is_zero())
            }
            None => Some(Duration::MAX),
        }
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> StoreResult<Option<Snapshot>> {
        let Some(blob) = self.entries.get(SNAPSHOT_KEY).map(|b| b.clone()) else {
            return Ok(None);
        };

        if blob.is_expired(Instant::now()) {
            self.entries.remove(SNAPSHOT_KEY);
            return Ok(None);
        }

        decode(&blob.data)
    }

    async fn save(&self, snapshot: &Snapshot, ttl: Duration) -> StoreResult<()> {
        let data = encode(snapshot, ttl)?;
        self.entries.insert(
            SNAPSHOT_KEY.to_string(),
            Blob {
                data,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }
}
