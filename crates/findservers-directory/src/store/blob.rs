//! Remote blob storage over HTTP.
//!
//! The snapshot envelope is `PUT` to `<base_url>/servers.json` and read back
//! with a `GET` on the same URL. Both requests carry the store's read/write
//! token as a bearer credential.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{SNAPSHOT_FILE, SnapshotBackend, decode, encode};
use crate::error::{StoreError, StoreResult};
use crate::fetcher::ensure_crypto_provider;
use crate::listing::Snapshot;

/// Connection settings for [`HttpBlobBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Store root; the snapshot lives at `<base_url>/servers.json`
    pub base_url: String,

    /// Read/write token
    pub token: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl BlobConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBlobBackend {
    client: Client,
    url: Url,
    token: String,
}

impl HttpBlobBackend {
    pub fn new(config: BlobConfig) -> StoreResult<Self> {
        if config.token.is_empty() {
            return Err(StoreError::InvalidConfiguration(
                "blob store token is empty".to_string(),
            ));
        }

        let url = blob_url(&config.base_url)?;

        ensure_crypto_provider();
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("findservers/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url,
            token: config.token,
        })
    }

    /// Location of the snapshot blob.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn blob_url(base_url: &str) -> StoreResult<Url> {
    let mut base = Url::parse(base_url)
        .map_err(|e| StoreError::InvalidConfiguration(format!("{base_url}: {e}")))?;

    // Url::join replaces the last segment unless the base ends in '/'
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(SNAPSHOT_FILE)
        .map_err(|e| StoreError::InvalidConfiguration(format!("{base_url}: {e}")))
}

async fn status_error(response: reqwest::Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StoreError::Status { status, body }
}

#[async_trait]
impl SnapshotBackend for HttpBlobBackend {
    fn name(&self) -> &'static str {
        "blob"
    }

    async fn load(&self) -> StoreResult<Option<Snapshot>> {
        let response = self
            .client
            .get(self.url.clone())
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                decode(&bytes)
            }
            _ => Err(status_error(response).await),
        }
    }

    async fn save(&self, snapshot: &Snapshot, ttl: Duration) -> StoreResult<()> {
        let data = encode(snapshot, ttl)?;

        let response = self
            .client
            .put(self.url.clone())
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-add-random-suffix", "0")
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_snapshot;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpBlobBackend {
        HttpBlobBackend::new(BlobConfig::new(format!("{}/store", server.uri()), "rw-token"))
            .unwrap()
    }

    #[test]
    fn test_blob_url() {
        assert_eq!(
            blob_url("https://blob.example.com/state").unwrap().as_str(),
            "https://blob.example.com/state/servers.json"
        );
        assert_eq!(
            blob_url("https://blob.example.com/").unwrap().as_str(),
            "https://blob.example.com/servers.json"
        );
        assert!(blob_url("not a url").is_err());
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = HttpBlobBackend::new(BlobConfig::new("https://blob.example.com", "")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_save_puts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/store/servers.json"))
            .and(header_eq("authorization", "Bearer rw-token"))
            .and(header_eq("content-type", "application/json"))
            .and(header_eq("x-add-random-suffix", "0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        backend_for(&server)
            .save(&sample_snapshot(2), Duration::from_secs(60))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["servers"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let server = MockServer::start().await;
        let snapshot = sample_snapshot(3);
        let stored = encode(&snapshot, Duration::from_secs(60)).unwrap();

        Mock::given(method("GET"))
            .and(path("/store/servers.json"))
            .and(header_eq("authorization", "Bearer rw-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(stored))
            .mount(&server)
            .await;

        let loaded = backend_for(&server).load().await.unwrap().unwrap();
        assert_eq!(loaded.listings(), snapshot.listings());
    }

    #[tokio::test]
    async fn test_load_missing_blob() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(backend_for(&server).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_failure_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad token"))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .save(&sample_snapshot(1), Duration::from_secs(60))
            .await
            .unwrap_err();

        match err {
            StoreError::Status { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
