//! Single-file backend under a local directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{SNAPSHOT_FILE, SnapshotBackend, decode, encode};
use crate::error::StoreResult;
use crate::listing::Snapshot;

/// Stores the envelope as `<dir>/servers.json`.
///
/// Writes go to a sibling `.tmp` file first and are renamed into place, so a
/// crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct DiskBackend {
    path: PathBuf,
}

impl DiskBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotBackend for DiskBackend {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn load(&self) -> StoreResult<Option<Snapshot>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        decode(&bytes)
    }

    async fn save(&self, snapshot: &Snapshot, ttl: Duration) -> StoreResult<()> {
        let data = encode(snapshot, ttl)?;
        let temp_path = self.path.with_extension("tmp");

        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }

        fs::rename(&temp_path, &self.path).await?;
        tracing::debug!(path = %self.path.display(), bytes = data.len(), "snapshot written");
        Ok(())
    }
}
