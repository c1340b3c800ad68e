//! Server configuration management.
//!
//! Every flag can also be set through an environment variable, so the
//! server runs unchanged under a process supervisor or a container:
//!
//! ```text
//! STEAM_API_KEY=... FINDSERVERS_REFRESH_TOKEN=... findservers
//! findservers --api-key ... --store disk --store-dir /var/lib/findservers
//! ```

use clap::{Parser, ValueEnum};
use findservers_directory::{
    BlobConfig, DEFAULT_ENDPOINT, DirectoryConfig, DiskBackend, HttpBlobBackend, MemoryBackend,
    RefreshConfig, SnapshotBackend, UpstreamConfig,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

/// Upper bound for the refresh interval and the snapshot TTL (one year).
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

/// Durable mirror for published snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Keep snapshots in memory only
    #[default]
    None,
    /// In-process TTL store
    Memory,
    /// JSON file under `--store-dir`
    Disk,
    /// Remote blob store at `--blob-url`
    Blob,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "findservers",
    about = "Cached live game server directory",
    version
)]
pub struct ServerConfig {
    /// HTTP bind address
    #[arg(long, env = "FINDSERVERS_HTTP_BIND", default_value = "0.0.0.0:8080")]
    pub http_bind: SocketAddr,

    /// Directory served at `/`
    #[arg(long, env = "FINDSERVERS_PUBLIC_DIR", default_value = "./public")]
    pub public_dir: PathBuf,

    /// Upstream directory API key
    #[arg(long, env = "STEAM_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Upstream listing endpoint
    #[arg(long, env = "FINDSERVERS_UPSTREAM_URL", default_value = DEFAULT_ENDPOINT)]
    pub upstream_url: String,

    /// Bearer token for POST /api/refresh-servers (endpoint disabled when unset)
    #[arg(long, env = "FINDSERVERS_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Seconds between scheduled refresh cycles
    #[arg(long, env = "FINDSERVERS_REFRESH_INTERVAL_SECS", default_value_t = 600)]
    pub refresh_interval_secs: u64,

    /// Lifetime of a persisted snapshot, in seconds
    #[arg(long, env = "FINDSERVERS_SNAPSHOT_TTL_SECS", default_value_t = 900)]
    pub snapshot_ttl_secs: u64,

    /// Per-attempt upstream request timeout, in seconds
    #[arg(long, env = "FINDSERVERS_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Shard queries in flight at once
    #[arg(long, env = "FINDSERVERS_SHARD_CONCURRENCY", default_value_t = 4)]
    pub shard_concurrency: usize,

    /// Durable snapshot store
    #[arg(long, env = "FINDSERVERS_STORE", value_enum, default_value_t = StoreKind::None)]
    pub store: StoreKind,

    /// Directory for the disk store
    #[arg(long, env = "FINDSERVERS_STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Base URL of the blob store
    #[arg(long, env = "BLOB_URL")]
    pub blob_url: Option<String>,

    /// Read/write token for the blob store
    #[arg(long, env = "BLOB_READ_WRITE_TOKEN", hide_env_values = true)]
    pub blob_token: Option<String>,

    /// Log output format
    #[arg(long, env = "FINDSERVERS_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the API key is empty
    /// - the refresh interval or shard concurrency is zero
    /// - the refresh interval or snapshot TTL exceeds [`MAX_PERIOD_SECS`]
    /// - the disk store has no directory
    /// - the blob store lacks a URL or token
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingRequired("STEAM_API_KEY".to_string()));
        }

        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "refresh interval",
                reason: "must be at least one second".to_string(),
            });
        }

        if self.refresh_interval_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::InvalidValue {
                name: "refresh interval",
                reason: format!("must not exceed {MAX_PERIOD_SECS} seconds"),
            });
        }

        if self.snapshot_ttl_secs > MAX_PERIOD_SECS {
            return Err(ConfigError::InvalidValue {
                name: "snapshot TTL",
                reason: format!("must not exceed {MAX_PERIOD_SECS} seconds"),
            });
        }

        if self.shard_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "shard concurrency",
                reason: "must be at least 1".to_string(),
            });
        }

        match self.store {
            StoreKind::Disk if self.store_dir.is_none() => Err(ConfigError::MissingRequired(
                "FINDSERVERS_STORE_DIR for the disk store".to_string(),
            )),
            StoreKind::Blob if self.blob_url.is_none() => Err(ConfigError::MissingRequired(
                "BLOB_URL for the blob store".to_string(),
            )),
            StoreKind::Blob if self.blob_token.as_deref().is_none_or(str::is_empty) => {
                Err(ConfigError::MissingRequired(
                    "BLOB_READ_WRITE_TOKEN for the blob store".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Engine configuration derived from the flags.
    #[must_use]
    pub fn directory_config(&self) -> DirectoryConfig {
        let snapshot_ttl = Duration::from_secs(self.snapshot_ttl_secs);
        DirectoryConfig {
            upstream: UpstreamConfig {
                endpoint: self.upstream_url.clone(),
                api_key: self.api_key.clone(),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                concurrency: self.shard_concurrency,
                ..UpstreamConfig::default()
            },
            refresh: RefreshConfig {
                interval: Duration::from_secs(self.refresh_interval_secs),
                snapshot_ttl,
                ..RefreshConfig::default()
            },
            ..DirectoryConfig::default()
        }
    }

    /// Build the configured durable backend, if any.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the selected store is missing settings or
    /// its client cannot be constructed.
    pub fn backend(&self) -> Result<Option<Arc<dyn SnapshotBackend>>, ConfigError> {
        let backend: Arc<dyn SnapshotBackend> = match self.store {
            StoreKind::None => return Ok(None),
            StoreKind::Memory => Arc::new(MemoryBackend::new()),
            StoreKind::Disk => {
                let dir = self.store_dir.as_ref().ok_or_else(|| {
                    ConfigError::MissingRequired("FINDSERVERS_STORE_DIR".to_string())
                })?;
                Arc::new(DiskBackend::new(dir))
            }
            StoreKind::Blob => {
                let (Some(url), Some(token)) = (&self.blob_url, &self.blob_token) else {
                    return Err(ConfigError::MissingRequired(
                        "BLOB_URL and BLOB_READ_WRITE_TOKEN".to_string(),
                    ));
                };
                Arc::new(HttpBlobBackend::new(BlobConfig::new(url, token))?)
            }
        };
        Ok(Some(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["findservers", "--api-key", "test-key"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.http_bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.public_dir, PathBuf::from("./public"));
        assert_eq!(config.upstream_url, DEFAULT_ENDPOINT);
        assert_eq!(config.refresh_interval_secs, 600);
        assert_eq!(config.snapshot_ttl_secs, 900);
        assert_eq!(config.store, StoreKind::None);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.refresh_token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_directory_config_mapping() {
        let config = parse(&[
            "--refresh-interval-secs",
            "60",
            "--snapshot-ttl-secs",
            "120",
            "--request-timeout-secs",
            "5",
            "--shard-concurrency",
            "2",
        ]);
        let directory = config.directory_config();
        assert_eq!(directory.upstream.api_key, "test-key");
        assert_eq!(directory.upstream.request_timeout, Duration::from_secs(5));
        assert_eq!(directory.upstream.concurrency, 2);
        assert_eq!(directory.upstream.shards.len(), 9);
        assert_eq!(directory.refresh.interval, Duration::from_secs(60));
        assert_eq!(directory.refresh.snapshot_ttl, Duration::from_secs(120));
        assert_eq!(directory.refresh.min_listings, 10);
    }

    #[test]
    fn test_validate_rejects_blank_key() {
        let mut config = parse(&[]);
        config.api_key = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(parse(&["--refresh-interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--shard-concurrency", "0"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_periods() {
        let max = MAX_PERIOD_SECS.to_string();
        let over = (MAX_PERIOD_SECS + 1).to_string();

        assert!(parse(&["--snapshot-ttl-secs", max.as_str()]).validate().is_ok());
        assert!(matches!(
            parse(&["--store", "memory", "--snapshot-ttl-secs", "18446744073709551615"]).validate(),
            Err(ConfigError::InvalidValue { name: "snapshot TTL", .. })
        ));
        assert!(parse(&["--snapshot-ttl-secs", over.as_str()]).validate().is_err());
        assert!(matches!(
            parse(&["--refresh-interval-secs", over.as_str()]).validate(),
            Err(ConfigError::InvalidValue { name: "refresh interval", .. })
        ));
    }

    #[test]
    fn test_disk_store_requires_dir() {
        assert!(parse(&["--store", "disk"]).validate().is_err());

        let config = parse(&["--store", "disk", "--store-dir", "/tmp/findservers"]);
        assert!(config.validate().is_ok());
        assert_eq!(config.backend().unwrap().unwrap().name(), "disk");
    }

    #[test]
    fn test_blob_store_requires_url_and_token() {
        assert!(parse(&["--store", "blob"]).validate().is_err());
        assert!(
            parse(&["--store", "blob", "--blob-url", "https://blob.example.com"])
                .validate()
                .is_err()
        );

        let config = parse(&[
            "--store",
            "blob",
            "--blob-url",
            "https://blob.example.com",
            "--blob-token",
            "rw",
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.backend().unwrap().unwrap().name(), "blob");
    }

    #[test]
    fn test_no_store_means_no_backend() {
        assert!(parse(&[]).backend().unwrap().is_none());
        assert_eq!(
            parse(&["--store", "memory"]).backend().unwrap().unwrap().name(),
            "memory"
        );
    }
}
