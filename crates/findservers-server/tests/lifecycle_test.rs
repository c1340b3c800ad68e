//! End-to-end server lifecycle against a mocked upstream directory.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use clap::Parser;
use findservers_server::{Server, ServerConfig};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn upstream_body(count: usize) -> serde_json::Value {
    let servers: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "addr": format!("198.51.100.{i}:27015"),
                "gameport": 27015,
                "name": format!("Test server {i}"),
                "appid": 730,
                "region": 3,
                "players": 3,
                "max_players": 16,
                "map": "de_ancient",
                "secure": true,
                "dedicated": true,
                "gametype": "secure"
            })
        })
        .collect();
    serde_json::json!({ "response": { "servers": servers } })
}

async fn mock_upstream(count: usize) -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body(count)))
        .mount(&upstream)
        .await;
    upstream
}

async fn listings(addr: std::net::SocketAddr) -> Vec<serde_json::Value> {
    let response = reqwest::get(format!("http://{addr}/api/servers"))
        .await
        .expect("Failed to query servers");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.bytes().await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_cold_start_refresh_serve_and_shutdown() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let upstream = mock_upstream(12).await;
    let store = TempDir::new().unwrap();
    let public = TempDir::new().unwrap();
    let endpoint = format!("{}/list", upstream.uri());

    let config = ServerConfig::try_parse_from([
        "findservers",
        "--api-key",
        "test-key",
        "--upstream-url",
        endpoint.as_str(),
        "--store",
        "disk",
        "--store-dir",
        store.path().to_str().unwrap(),
        "--public-dir",
        public.path().to_str().unwrap(),
    ])
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = Server::new(config).unwrap();
    let running = tokio::spawn(server.serve(listener, async {
        let _ = shutdown_rx.await;
    }));

    // The first refresh completes before requests are answered
    let served = tokio::time::timeout(Duration::from_secs(10), listings(addr))
        .await
        .expect("Server did not answer in time");
    assert_eq!(served.len(), 12);
    assert_eq!(served[0]["ip"], "198.51.100.0");

    assert!(store.path().join("servers.json").exists());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(10), running)
        .await
        .expect("Server did not shut down")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_warm_start_serves_persisted_snapshot() {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let store = TempDir::new().unwrap();
    let public = TempDir::new().unwrap();

    // First process: publish and persist
    {
        let upstream = mock_upstream(15).await;
        let endpoint = format!("{}/list", upstream.uri());
        let config = ServerConfig::try_parse_from([
            "findservers",
            "--api-key",
            "test-key",
            "--upstream-url",
            endpoint.as_str(),
            "--store",
            "disk",
            "--store-dir",
            store.path().to_str().unwrap(),
            "--public-dir",
            public.path().to_str().unwrap(),
        ])
        .unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(config).unwrap();
        server
            .serve(listener, std::future::ready(()))
            .await
            .unwrap();
    }

    // Second process: upstream is down, the persisted snapshot is served
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    let endpoint = format!("{}/list", upstream.uri());

    let config = ServerConfig::try_parse_from([
        "findservers",
        "--api-key",
        "test-key",
        "--upstream-url",
        endpoint.as_str(),
        "--store",
        "disk",
        "--store-dir",
        store.path().to_str().unwrap(),
        "--public-dir",
        public.path().to_str().unwrap(),
    ])
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server = Server::new(config).unwrap();
    let running = tokio::spawn(server.serve(listener, async {
        let _ = shutdown_rx.await;
    }));

    let served = tokio::time::timeout(Duration::from_secs(10), listings(addr))
        .await
        .expect("Server did not answer in time");
    assert_eq!(served.len(), 15);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(30), running)
        .await
        .expect("Server did not shut down")
        .unwrap()
        .unwrap();
}
