//! Published snapshot holder.
//!
//! Readers clone an `Arc<Snapshot>` out of the slot and never hold the lock
//! while using it. A publish swaps the whole pointer, so a reader observes
//! either the previous snapshot or the new one, never a mix. The durable
//! backend is written after the swap and its failures are only logged.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::listing::Snapshot;
use crate::store::SnapshotBackend;

/// Point-in-time description of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub populated: bool,
    pub listing_count: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub ttl_remaining_secs: Option<u64>,
    pub backend: Option<&'static str>,
}

pub struct CacheStore {
    current: RwLock<Option<Arc<Snapshot>>>,
    backend: Option<Arc<dyn SnapshotBackend>>,
    ttl: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("populated", &self.current.read().is_some())
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl CacheStore {
    /// In-memory only store.
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            backend: None,
            ttl,
        }
    }

    /// Store that mirrors every publish into `backend`.
    pub fn with_backend(backend: Arc<dyn SnapshotBackend>, ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            backend: Some(backend),
            ttl,
        }
    }

    /// Newest published snapshot, or `None` before the first publish.
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    /// Make `snapshot` the current one, then persist it.
    pub async fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = Some(Arc::clone(&snapshot));

        if let Some(backend) = &self.backend {
            let ttl = snapshot.ttl().unwrap_or(self.ttl);
            match backend.save(&snapshot, ttl).await {
                Ok(()) => tracing::debug!(
                    backend = backend.name(),
                    listings = snapshot.len(),
                    "snapshot persisted"
                ),
                Err(e) => tracing::error!(
                    backend = backend.name(),
                    error = %e,
                    "failed to persist snapshot"
                ),
            }
        }

        snapshot
    }

    /// Install the durable copy if nothing has been published yet.
    ///
    /// Returns `true` when a snapshot was installed.
    pub async fn load_from_durable(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };

        let snapshot = match backend.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::info!(backend = backend.name(), "no durable snapshot available");
                return false;
            }
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "failed to load durable snapshot");
                return false;
            }
        };

        let mut current = self.current.write();
        if current.is_some() {
            tracing::debug!("durable snapshot ignored, a newer one is already published");
            return false;
        }

        tracing::info!(
            backend = backend.name(),
            listings = snapshot.len(),
            created_at = %snapshot.created_at(),
            "restored durable snapshot"
        );
        *current = Some(Arc::new(snapshot));
        true
    }

    pub fn info(&self) -> CacheInfo {
        let backend = self.backend.as_ref().map(|b| b.name());
        match self.read() {
            Some(snapshot) => CacheInfo {
                populated: true,
                listing_count: snapshot.len(),
                timestamp: Some(snapshot.created_at()),
                age_secs: Some(snapshot.age().as_secs()),
                ttl_remaining_secs: snapshot.ttl_remaining().map(|d| d.as_secs()),
                backend,
            },
            None => CacheInfo {
                populated: false,
                listing_count: 0,
                timestamp: None,
                age_secs: None,
                ttl_remaining_secs: None,
                backend,
            },
        }
    }
}
