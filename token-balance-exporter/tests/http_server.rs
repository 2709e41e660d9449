//! Tests the metrics exposition endpoint over a real socket

use std::{collections::HashMap, net::SocketAddr};

use alloy::primitives::{address, Address, U256};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use token_balance_exporter::{
    chain_client::mock::MockChainClient,
    config::ExporterConfig,
    registry::{labels::TOKEN_BALANCE_METRIC_NAME, test_utils::sample_value},
    watcher::{RunningWatcher, Watcher, WatcherSettings},
};

/// The wallet tracked in tests
const ALICE: Address = address!("0x0000000000000000000000000000000000000001");
/// The USDC contract used in tests
const USDC: Address = address!("0x0000000000000000000000000000000000000abc");

/// A single-chain config tracking USDC
const CONFIG: &str = r#"{
    "chains": { "eth": "http://localhost:8545" },
    "tokens": { "eth": [{ "contract": "0xABC", "symbol": "USDC", "decimal": 6 }] },
    "wallets": [{ "name": "alice", "address": "0x1", "track_for": { "eth": ["USDC"] } }]
}"#;

/// Start a watcher over a mock reporting 5 USDC, after one completed refresh
async fn start_watcher() -> RunningWatcher {
    let (_, client) = MockChainClient::new()
        .with_token_balance(USDC, ALICE, U256::from(5_000_000u64))
        .into_shared();

    let config = ExporterConfig::from_json_str(CONFIG).unwrap();
    let clients = HashMap::from([("eth".to_string(), client)]);
    let watcher = Watcher::with_clients(&config, clients, WatcherSettings::default()).unwrap();
    watcher.refresh_once().await;

    watcher.start("127.0.0.1:0".parse().unwrap()).await.unwrap()
}

/// Send a raw HTTP/1.1 request and return the response head and body
async fn request(addr: SocketAddr, method: &str, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut resp = String::new();
    stream.read_to_string(&mut resp).await.unwrap();

    let (head, body) = resp.split_once("\r\n\r\n").unwrap();
    (head.to_string(), body.to_string())
}

/// The status line of a response head
fn status_line(head: &str) -> &str {
    head.lines().next().unwrap_or_default()
}

/// Tests that `GET /metrics` serves the rendered registry
#[tokio::test]
async fn test_get_metrics() {
    let running = start_watcher().await;

    let (head, body) = request(running.local_addr(), "GET", "/metrics").await;
    assert_eq!(status_line(&head), "HTTP/1.1 200 OK");
    assert!(head.to_lowercase().contains("content-type: text/plain; version=0.0.4"));

    let labels = [("chain", "eth"), ("symbol", "USDC"), ("name", "alice")];
    assert_eq!(sample_value(&body, TOKEN_BALANCE_METRIC_NAME, &labels), Some(5.0));

    running.stop().await.unwrap();
}

/// Tests that unknown paths are not found
#[tokio::test]
async fn test_unknown_path() {
    let running = start_watcher().await;

    let (head, _) = request(running.local_addr(), "GET", "/health").await;
    assert_eq!(status_line(&head), "HTTP/1.1 404 Not Found");

    running.stop().await.unwrap();
}

/// Tests that only `GET` is served on the metrics route
#[tokio::test]
async fn test_wrong_method() {
    let running = start_watcher().await;

    let (head, _) = request(running.local_addr(), "POST", "/metrics").await;
    assert_eq!(status_line(&head), "HTTP/1.1 405 Method Not Allowed");

    running.stop().await.unwrap();
}

/// Tests that the listener is closed once the watcher stops
#[tokio::test]
async fn test_stop_closes_listener() {
    let running = start_watcher().await;
    let addr = running.local_addr();
    running.stop().await.unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}
