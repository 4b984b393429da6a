//! HTTP Replica
//!
//! Implements TelemetryStore against another collection point's HTTP API, so
//! the sync engine can treat a remote replica exactly like a local store.
//!
//! Endpoints used:
//! - `GET  /gwlatest`  watermark map
//! - `POST /pull`      body `{gateway_id: since}`, returns records
//! - `POST /push`      body `[record, ...]`, 204 on commit

use crate::domain::entities::{TelemetryRecord, WatermarkMap};
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::ports::TelemetryStore;
use crate::domain::value_objects::{GatewayId, Timestamp};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Configuration for a remote replica.
#[derive(Debug, Clone)]
pub struct HttpReplicaConfig {
    /// Base URL of the peer's API (e.g., "http://10.0.0.2:8088")
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for HttpReplicaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8088".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Telemetry store reached over HTTP.
pub struct HttpReplica {
    base_url: String,
    client: reqwest::Client,
}

impl HttpReplica {
    pub fn new(config: HttpReplicaConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn pull(&self, since: &WatermarkMap) -> StoreResult<Vec<TelemetryRecord>> {
        let response = self
            .client
            .post(self.url("/pull"))
            .json(since)
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }
}

fn transport_error(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("{} - {}", status, body)
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
    if !response.status().is_success() {
        return Err(StoreError::Unavailable(error_body(response).await));
    }

    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidData(e.to_string()))
}

#[async_trait]
impl TelemetryStore for HttpReplica {
    async fn latest_per_gateway(&self) -> StoreResult<WatermarkMap> {
        let response = self
            .client
            .get(self.url("/gwlatest"))
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }

    async fn records_since(
        &self,
        gateway_id: &GatewayId,
        after: Timestamp,
    ) -> StoreResult<Vec<TelemetryRecord>> {
        let mut since = WatermarkMap::new();
        since.insert(*gateway_id, after);
        self.pull(&since).await
    }

    // One round trip for the whole set instead of one per gateway.
    async fn records_after(&self, since: &WatermarkMap) -> StoreResult<Vec<TelemetryRecord>> {
        if since.is_empty() {
            return Ok(Vec::new());
        }
        self.pull(since).await
    }

    async fn bulk_insert(&self, records: Vec<TelemetryRecord>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let attempted = records.len();
        let response = self
            .client
            .post(self.url("/push"))
            .json(&records)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::PartialInsert {
                attempted,
                reason: error_body(response).await,
            }),
            _ => Err(StoreError::Unavailable(error_body(response).await)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Fix;
    use crate::domain::value_objects::{DeviceId, GeoPoint};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(gw: &str, ts: &str) -> TelemetryRecord {
        TelemetryRecord {
            gateway_id: GatewayId::parse(gw).unwrap(),
            gateway_location: GeoPoint::new(-37.8, 144.9, 40.0),
            application_id: 1,
            device_id: DeviceId::parse("0004a30b001c0530").unwrap(),
            receive_timestamp: Timestamp::parse(ts).unwrap(),
            receive_signal_strength: -100,
            receive_snr: 5.0,
            fix: Fix::no_fix(GeoPoint::new(0.0, 0.0, 0.0)),
        }
    }

    fn replica(server: &MockServer) -> HttpReplica {
        HttpReplica::new(HttpReplicaConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = HttpReplicaConfig::default();
        assert_eq!(config.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_latest_per_gateway() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gwlatest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aaaaaaaaaaaaaaaa": "2024-01-01T00:05:00.000000+00:00"
            })))
            .mount(&mock_server)
            .await;

        let marks = replica(&mock_server).latest_per_gateway().await.unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(
            marks[&GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap()],
            Timestamp::parse("2024-01-01T00:05:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_latest_per_gateway_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gwlatest"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let err = replica(&mock_server).latest_per_gateway().await.unwrap_err();
        match err {
            StoreError::Unavailable(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_latest_per_gateway_invalid_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gwlatest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "not-a-gateway": "2024-01-01T00:05:00+00:00"
            })))
            .mount(&mock_server)
            .await;

        let err = replica(&mock_server).latest_per_gateway().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_records_after_single_request() {
        let mock_server = MockServer::start().await;
        let returned = vec![
            record("aaaaaaaaaaaaaaaa", "2024-01-01T00:01:00Z"),
            record("bbbbbbbbbbbbbbbb", "2024-01-01T00:02:00Z"),
        ];

        Mock::given(method("POST"))
            .and(path("/pull"))
            .and(body_json(serde_json::json!({
                "aaaaaaaaaaaaaaaa": "0001-01-01T00:00:00.000000+00:00",
                "bbbbbbbbbbbbbbbb": "2024-01-01T00:00:00.000000+00:00"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(&returned))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut since = WatermarkMap::new();
        since.insert(GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap(), Timestamp::minimum());
        since.insert(
            GatewayId::parse("bbbbbbbbbbbbbbbb").unwrap(),
            Timestamp::parse("2024-01-01T00:00:00Z").unwrap(),
        );

        let batch = replica(&mock_server).records_after(&since).await.unwrap();
        assert_eq!(batch, returned);
    }

    #[tokio::test]
    async fn test_records_since_sends_one_entry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/pull"))
            .and(body_json(serde_json::json!({
                "aaaaaaaaaaaaaaaa": "2024-01-01T00:00:00.000000+00:00"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gw = GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap();
        let batch = replica(&mock_server)
            .records_since(&gw, Timestamp::parse("2024-01-01T00:00:00Z").unwrap())
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_insert_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = replica(&mock_server)
            .bulk_insert(vec![record("aaaaaaaaaaaaaaaa", "2024-01-01T00:00:00Z")])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_insert_empty_batch_skips_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&mock_server)
            .await;

        assert!(replica(&mock_server).bulk_insert(Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_insert_conflict_is_partial_insert() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/push"))
            .respond_with(ResponseTemplate::new(409).set_body_string("rolled back"))
            .mount(&mock_server)
            .await;

        let err = replica(&mock_server)
            .bulk_insert(vec![
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:00:00Z"),
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:01:00Z"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PartialInsert { attempted: 2, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_unavailable() {
        // Nothing listens on the discard port.
        let replica = HttpReplica::new(HttpReplicaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let err = replica.latest_per_gateway().await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
