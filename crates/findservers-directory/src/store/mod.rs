//! Durable snapshot backends.
//!
//! The cache store mirrors every published snapshot into at most one
//! backend and reads it back once at cold start. Every backend stores the
//! same JSON envelope under one fixed key:
//!
//! ```json
//! {
//!     "servers": [ ...clean listings... ],
//!     "timestamp": "2024-01-01T00:00:00Z",
//!     "expires_at": "2024-01-01T00:15:00Z"
//! }
//! ```
//!
//! Backends never decide what is visible to readers; that is the cache
//! store's job. They only persist and recall the newest snapshot.

mod blob;
mod disk;
mod memory;

pub use blob::{BlobConfig, HttpBlobBackend};
pub use disk::DiskBackend;
pub use memory::MemoryBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StoreResult;
use crate::listing::{CleanListing, Snapshot};

/// Key under which the snapshot blob is stored.
pub const SNAPSHOT_KEY: &str = "servers:list";

/// File name used by file-like backends.
pub const SNAPSHOT_FILE: &str = "servers.json";

/// Persistence for the newest published snapshot.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Returns `None` when nothing is stored or the stored copy has expired.
    async fn load(&self) -> StoreResult<Option<Snapshot>>;

    /// Replace the stored snapshot; it expires after `ttl`.
    async fn save(&self, snapshot: &Snapshot, ttl: Duration) -> StoreResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    servers: Vec<CleanListing>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    fn from_snapshot(snapshot: &Snapshot, ttl: Duration) -> Self {
        Self {
            servers: snapshot.listings().to_vec(),
            timestamp: snapshot.created_at(),
            expires_at: chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| snapshot.created_at().checked_add_signed(ttl)),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| Utc::now() >= expires)
    }

    fn into_snapshot(self) -> Snapshot {
        let ttl = self
            .expires_at
            .and_then(|expires| (expires - self.timestamp).to_std().ok());
        let snapshot = Snapshot::with_timestamp(self.servers, self.timestamp);
        match ttl {
            Some(ttl) => snapshot.with_ttl(ttl),
            None => snapshot,
        }
    }
}

/// Serialize a snapshot into the shared envelope format.
pub fn encode(snapshot: &Snapshot, ttl: Duration) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(&Envelope::from_snapshot(snapshot, ttl))?)
}

/// Parse an envelope; expired envelopes decode to `None`.
pub fn decode(bytes: &[u8]) -> StoreResult<Option<Snapshot>> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.is_expired() {
        return Ok(None);
    }
    Ok(Some(envelope.into_snapshot()))
}
