//! Ingest Service - Uplink use case
//!
//! Turns a network-server uplink into a telemetry record: validate the
//! identifiers, decode the tracker payload, then persist the record.

use crate::domain::entities::TelemetryRecord;
use crate::domain::errors::{IdentifierFormatError, MalformedPayload, StoreError};
use crate::domain::ports::TelemetryStore;
use crate::domain::services::PayloadCodec;
use crate::domain::value_objects::{DeviceId, GatewayId, GeoPoint, Timestamp};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

/// Uplink event as posted by the LoRaWAN network server.
#[derive(Debug, Clone, Deserialize)]
pub struct Uplink {
    #[serde(rename = "applicationID", deserialize_with = "application_id")]
    pub application_id: i64,
    #[serde(rename = "devEUI")]
    pub dev_eui: String,
    #[serde(rename = "rxInfo", default)]
    pub rx_info: Vec<RxInfo>,
    /// Base64 tracker payload
    pub data: String,
}

/// Reception metadata from one gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct RxInfo {
    #[serde(rename = "gatewayID")]
    pub gateway_id: String,
    pub time: String,
    pub rssi: i32,
    #[serde(rename = "loRaSNR")]
    pub lora_snr: f64,
    pub location: Option<UplinkLocation>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UplinkLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

// Network servers disagree on whether the application ID is a number or a
// numeric string.
fn application_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Malformed(#[from] MalformedPayload),
    #[error(transparent)]
    Identifier(#[from] IdentifierFormatError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Uplink ingest use case.
pub struct IngestService {
    store: Arc<dyn TelemetryStore>,
}

impl IngestService {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Parse a raw uplink body and ingest it.
    pub async fn ingest_json(&self, body: &[u8]) -> Result<TelemetryRecord, IngestError> {
        let uplink: Uplink = serde_json::from_slice(body)
            .map_err(|e| MalformedPayload::new(format!("invalid uplink: {}", e)))?;
        self.ingest(uplink).await
    }

    /// Build a record from `uplink` and store it.
    ///
    /// Nothing is stored unless the whole uplink is valid.
    pub async fn ingest(&self, uplink: Uplink) -> Result<TelemetryRecord, IngestError> {
        let record = Self::to_record(uplink)?;

        self.store.bulk_insert(vec![record.clone()]).await?;

        tracing::debug!(
            "ingested uplink device={} gateway={} rx={} fix={}",
            record.device_id,
            record.gateway_id,
            record.receive_timestamp,
            if record.fix.is_no_fix() { "none" } else { "ok" }
        );
        Ok(record)
    }

    /// Validate and decode an uplink without storing it.
    pub fn to_record(uplink: Uplink) -> Result<TelemetryRecord, IngestError> {
        let device_id = DeviceId::parse(&uplink.dev_eui)?;

        let rx = uplink
            .rx_info
            .into_iter()
            .next()
            .ok_or_else(|| MalformedPayload::new("uplink has no rxInfo"))?;
        let gateway_id = GatewayId::parse(&rx.gateway_id)?;
        let location = rx
            .location
            .ok_or_else(|| MalformedPayload::new("rxInfo has no gateway location"))?;
        let receive_timestamp = Timestamp::parse(&rx.time)
            .map_err(|e| MalformedPayload::new(e.to_string()))?;

        let raw = STANDARD
            .decode(uplink.data.trim())
            .map_err(|e| MalformedPayload::new(format!("invalid base64 data: {}", e)))?;
        let fix = PayloadCodec::decode(&raw)?;

        Ok(TelemetryRecord {
            gateway_id,
            gateway_location: GeoPoint::new(location.latitude, location.longitude, location.altitude),
            application_id: uplink.application_id,
            device_id,
            receive_timestamp,
            receive_signal_strength: rx.rssi,
            receive_snr: rx.lora_snr,
            fix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::MemoryTelemetryStore;
    use crate::domain::entities::Fix;
    use serde_json::json;

    fn payload(fix: &Fix) -> String {
        STANDARD.encode(PayloadCodec::encode(fix).unwrap())
    }

    fn uplink_json(data: &str) -> serde_json::Value {
        json!({
            "applicationID": "3",
            "applicationName": "trackers",
            "deviceName": "tracker-01",
            "devEUI": "0004A30B001C0530",
            "rxInfo": [{
                "gatewayID": "00800000A0001234",
                "name": "rooftop",
                "time": "2019-01-03T22:48:16.080583Z",
                "rssi": -97,
                "loRaSNR": 7.5,
                "location": {"latitude": -37.812305, "longitude": 144.962594, "altitude": 41}
            }],
            "txInfo": {"frequency": 916800000, "dr": 2},
            "adr": true,
            "fCnt": 12,
            "fPort": 1,
            "data": data
        })
    }

    fn sample_fix() -> Fix {
        Fix::at(
            GeoPoint::new(-37.812305, 144.962594, 12.34),
            Timestamp::parse("2019-01-03T22:48:15.50Z").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_ingest_stores_record() {
        let store = Arc::new(MemoryTelemetryStore::new());
        let service = IngestService::new(store.clone());

        let body = uplink_json(&payload(&sample_fix())).to_string();
        let record = service.ingest_json(body.as_bytes()).await.unwrap();

        assert_eq!(record.application_id, 3);
        assert_eq!(record.device_id.to_string(), "0004a30b001c0530");
        assert_eq!(record.gateway_id.to_string(), "00800000a0001234");
        assert_eq!(record.receive_timestamp.to_iso(), "2019-01-03T22:48:16.080583+00:00");
        assert_eq!(record.receive_signal_strength, -97);
        assert_eq!(record.gateway_location.altitude, 41.0);
        assert_eq!(record.fix, sample_fix());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_numeric_application_id() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let mut body = uplink_json(&payload(&sample_fix()));
        body["applicationID"] = json!(42);

        let record = service.ingest_json(body.to_string().as_bytes()).await.unwrap();
        assert_eq!(record.application_id, 42);
    }

    #[tokio::test]
    async fn test_no_fix_payload() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let no_fix = Fix::no_fix(GeoPoint::new(0.0, 0.0, 0.0));

        let body = uplink_json(&payload(&no_fix)).to_string();
        let record = service.ingest_json(body.as_bytes()).await.unwrap();
        assert!(record.fix.is_no_fix());
    }

    #[tokio::test]
    async fn test_short_payload_is_malformed_and_not_stored() {
        let store = Arc::new(MemoryTelemetryStore::new());
        let service = IngestService::new(store.clone());

        let body = uplink_json(&STANDARD.encode([0u8; 12])).to_string();
        let err = service.ingest_json(body.as_bytes()).await.unwrap_err();

        assert!(matches!(err, IngestError::Malformed(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_bad_base64_is_malformed() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let body = uplink_json("!!not base64!!").to_string();
        let err = service.ingest_json(body.as_bytes()).await.unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_rx_info_is_malformed() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let mut body = uplink_json(&payload(&sample_fix()));
        body["rxInfo"] = json!([]);

        let err = service.ingest_json(body.to_string().as_bytes()).await.unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_missing_location_is_malformed() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let mut body = uplink_json(&payload(&sample_fix()));
        body["rxInfo"][0]
            .as_object_mut()
            .unwrap()
            .remove("location");

        let err = service.ingest_json(body.to_string().as_bytes()).await.unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_bad_identifiers() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));

        let mut body = uplink_json(&payload(&sample_fix()));
        body["devEUI"] = json!("0004a30b");
        let err = service.ingest_json(body.to_string().as_bytes()).await.unwrap_err();
        assert!(matches!(err, IngestError::Identifier(_)));

        let mut body = uplink_json(&payload(&sample_fix()));
        body["rxInfo"][0]["gatewayID"] = json!("gateway-1");
        let err = service.ingest_json(body.to_string().as_bytes()).await.unwrap_err();
        assert!(matches!(err, IngestError::Identifier(_)));
    }

    #[tokio::test]
    async fn test_not_json_is_malformed() {
        let service = IngestService::new(Arc::new(MemoryTelemetryStore::new()));
        let err = service.ingest_json(b"{not json").await.unwrap_err();
        assert!(matches!(err, IngestError::Malformed(_)));
    }
}
