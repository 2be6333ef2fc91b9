//! Bitnodes snapshot fetcher
//!
//! The payload is `{ total_nodes, nodes: { address: nodeinfo } }`. A node
//! is active when its nodeinfo is a non-empty list, and counts as Tor when
//! its address or any string inside its nodeinfo mentions `.onion`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use pulse_core::{FetchError, NodeSnapshot, TelemetryFetcher};

use crate::client::{create_client, request_error, FetcherConfig};

const ONION_SUFFIX: &str = ".onion";

/// Wire schema of a network snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotPayload {
    pub total_nodes: u64,
    pub nodes: HashMap<String, Value>,
}

impl SnapshotPayload {
    pub fn parse(bytes: &[u8]) -> Result<Self, FetchError> {
        serde_json::from_slice(bytes).map_err(|e| FetchError::Payload(e.to_string()))
    }

    /// Count active and Tor nodes and derive the snapshot
    pub fn into_snapshot(self, timestamp: DateTime<Utc>) -> Result<NodeSnapshot, FetchError> {
        let mut active = 0u64;
        let mut tor = 0u64;

        for (address, info) in &self.nodes {
            if is_active(info) {
                active += 1;
            }
            if address.contains(ONION_SUFFIX) || mentions_onion(info) {
                tor += 1;
            }
        }

        if active > self.total_nodes || tor > self.total_nodes {
            return Err(FetchError::Inconsistent {
                total: self.total_nodes,
                active,
                tor,
            });
        }

        Ok(NodeSnapshot::new(timestamp, self.total_nodes, active, tor))
    }
}

fn is_active(info: &Value) -> bool {
    matches!(info, Value::Array(fields) if !fields.is_empty())
}

fn mentions_onion(info: &Value) -> bool {
    match info {
        Value::String(s) => s.contains(ONION_SUFFIX),
        Value::Array(items) => items.iter().any(mentions_onion),
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains(ONION_SUFFIX) || mentions_onion(value)),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Fetches snapshots from a Bitnodes-compatible HTTP endpoint
pub struct HttpFetcher {
    config: FetcherConfig,
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = create_client(&config)?;
        Ok(Self { config, client })
    }

    /// Use a pre-built client (custom TLS or proxy settings)
    pub fn with_client(config: FetcherConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Check whether the source answers with a success status
    pub async fn probe(&self) -> Result<bool, FetchError> {
        let response = self
            .client
            .get(&self.config.api_url)
            .send()
            .await
            .map_err(|e| request_error(e, &self.config))?;

        Ok(response.status().is_success())
    }
}

#[async_trait]
impl TelemetryFetcher for HttpFetcher {
    fn source(&self) -> &str {
        &self.config.api_url
    }

    async fn fetch(&self) -> Result<NodeSnapshot, FetchError> {
        debug!("Fetching snapshot from {}", self.config.api_url);

        let response = self
            .client
            .get(&self.config.api_url)
            .send()
            .await
            .map_err(|e| request_error(e, &self.config))?;

        if !response.status().is_success() {
            warn!("Source {} returned status: {}", self.config.api_url, response.status());
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| request_error(e, &self.config))?;
        let payload = SnapshotPayload::parse(&body)?;
        let listed = payload.nodes.len();
        let snapshot = payload.into_snapshot(Utc::now())?;

        info!(
            "Snapshot: {} total ({} listed), {} active, {} Tor ({:.2}%)",
            snapshot.total_nodes(),
            listed,
            snapshot.active_nodes(),
            snapshot.tor_nodes(),
            snapshot.tor_percentage()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SAMPLE: &str = r#"{
        "timestamp": 1700000000,
        "total_nodes": 5,
        "latest_height": 820000,
        "nodes": {
            "203.0.113.7:8333": [70016, "/Satoshi:25.0.0/", 1699990000, 1033, 819999, "host.example", "Berlin", "DE", 52.5, 13.4, "Europe/Berlin", "AS0", "Example"],
            "abcdefghijklmnop.onion:8333": [70016, "/Satoshi:25.0.0/", 1699990000, 1033, 819999, null, null, "TOR", 0.0, 0.0, null, "TOR", "Tor network"],
            "[2001:db8::1]:8333": [],
            "198.51.100.2:8333": [70016, "/Satoshi:24.0.1/", 1699990000, 1033, 819999, "xyzxyzxyzxyzxyz.onion", null, null, 0.0, 0.0, null, null, null],
            "192.0.2.9:8333": null
        }
    }"#;

    #[test]
    fn test_counts_active_and_tor_nodes() {
        let payload = SnapshotPayload::parse(SAMPLE.as_bytes()).unwrap();
        let snapshot = payload.into_snapshot(Utc::now()).unwrap();

        assert_eq!(snapshot.total_nodes(), 5);
        assert_eq!(snapshot.active_nodes(), 3);
        assert_eq!(snapshot.tor_nodes(), 2);
        assert_eq!(snapshot.tor_percentage(), 40.0);
        assert_eq!(snapshot.active_ratio(), 0.6);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = SnapshotPayload::parse(br#"{"nodes": {}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));

        let err = SnapshotPayload::parse(br#"{"total_nodes": 3, "nodes": []}"#).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));

        let err = SnapshotPayload::parse(br#"{"total_nodes": -1, "nodes": {}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[test]
    fn test_counts_above_total_rejected() {
        let payload = SnapshotPayload::parse(br#"{"total_nodes": 1, "nodes": {"a.onion:8333": [1], "b.onion:8333": [1]}}"#).unwrap();
        let err = payload.into_snapshot(Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::Inconsistent { total: 1, active: 2, tor: 2 }));
    }

    #[test]
    fn test_active_count_above_total_rejected() {
        let payload = SnapshotPayload::parse(
            br#"{"total_nodes": 1, "nodes": {"203.0.113.7:8333": [70016], "198.51.100.2:8333": [70016]}}"#,
        )
        .unwrap();
        let err = payload.into_snapshot(Utc::now()).unwrap_err();
        assert!(matches!(err, FetchError::Inconsistent { total: 1, active: 2, tor: 0 }));
    }

    #[test]
    fn test_empty_network() {
        let payload = SnapshotPayload::parse(br#"{"total_nodes": 0, "nodes": {}}"#).unwrap();
        let snapshot = payload.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snapshot.tor_percentage(), 0.0);
        assert_eq!(snapshot.active_ratio(), 0.0);
    }

    #[test]
    fn test_onion_inside_nested_info() {
        assert!(mentions_onion(&serde_json::json!({"peer": {"host": "x.onion"}})));
        assert!(!mentions_onion(&serde_json::json!([1, 2.5, true, null, "clearnet"])));
    }

    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/", addr)
    }

    fn local_fetcher(url: String) -> HttpFetcher {
        let config = FetcherConfig {
            api_url: url,
            ..FetcherConfig::default()
        };
        let client = Client::builder()
            .no_proxy()
            .timeout(config.timeout())
            .build()
            .unwrap();
        HttpFetcher::with_client(config, client)
    }

    #[tokio::test]
    async fn test_fetch_over_http() {
        let fetcher = local_fetcher(serve_once("200 OK", SAMPLE).await);
        let snapshot = fetcher.fetch().await.unwrap();
        assert_eq!(snapshot.tor_nodes(), 2);
        assert_eq!(snapshot.active_nodes(), 3);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let fetcher = local_fetcher(serve_once("503 Service Unavailable", "{}").await);
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let fetcher = local_fetcher(serve_once("200 OK", "<html>rate limited</html>").await);
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Payload(_)));
    }

    #[tokio::test]
    async fn test_unreachable_source() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = local_fetcher(format!("http://{}/", addr));
        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
