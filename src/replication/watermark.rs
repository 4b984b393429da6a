//! Watermark Resolver
//!
//! Thin query wrapper around a replica's `latest_per_gateway`.

use crate::domain::entities::WatermarkMap;
use crate::domain::errors::StoreResult;
use crate::domain::ports::TelemetryStore;
use crate::domain::value_objects::GatewayId;
use std::sync::Arc;

/// Reads the watermark map of one replica.
///
/// An empty store is an empty map, not an error. The map serializes to
/// `{gateway_id: "YYYY-MM-DDTHH:MM:SS.ffffff+00:00"}` at the API boundary.
#[derive(Clone)]
pub struct WatermarkResolver {
    store: Arc<dyn TelemetryStore>,
}

impl WatermarkResolver {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self { store }
    }

    /// Watermarks for every gateway the replica has seen.
    pub async fn latest(&self) -> StoreResult<WatermarkMap> {
        self.store.latest_per_gateway().await
    }

    /// Watermark for a single gateway; empty when the gateway is unknown.
    pub async fn latest_for(&self, gateway_id: &GatewayId) -> StoreResult<WatermarkMap> {
        let mut all = self.latest().await?;
        Ok(all
            .remove_entry(gateway_id)
            .into_iter()
            .collect::<WatermarkMap>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::outbound::MemoryTelemetryStore;
    use crate::domain::entities::{Fix, TelemetryRecord};
    use crate::domain::value_objects::{DeviceId, GeoPoint, Timestamp};

    fn record(gw: &str, ts: &str) -> TelemetryRecord {
        TelemetryRecord {
            gateway_id: GatewayId::parse(gw).unwrap(),
            gateway_location: GeoPoint::new(0.0, 0.0, 0.0),
            application_id: 1,
            device_id: DeviceId::parse("0004a30b001c0530").unwrap(),
            receive_timestamp: Timestamp::parse(ts).unwrap(),
            receive_signal_strength: -90,
            receive_snr: 9.0,
            fix: Fix::no_fix(GeoPoint::new(0.0, 0.0, 0.0)),
        }
    }

    async fn resolver() -> WatermarkResolver {
        let store = Arc::new(MemoryTelemetryStore::new());
        store
            .bulk_insert(vec![
                record("aaaaaaaaaaaaaaaa", "2019-01-03T22:48:16.080583Z"),
                record("bbbbbbbbbbbbbbbb", "2019-01-03T22:00:00Z"),
            ])
            .await
            .unwrap();
        WatermarkResolver::new(store)
    }

    #[tokio::test]
    async fn test_empty_store_is_empty_map() {
        let resolver = WatermarkResolver::new(Arc::new(MemoryTelemetryStore::new()));
        assert!(resolver.latest().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_renders_iso_microseconds() {
        let marks = resolver().await.latest().await.unwrap();
        let json = serde_json::to_value(&marks).unwrap();
        assert_eq!(json["aaaaaaaaaaaaaaaa"], "2019-01-03T22:48:16.080583+00:00");
        assert_eq!(json["bbbbbbbbbbbbbbbb"], "2019-01-03T22:00:00.000000+00:00");
    }

    #[tokio::test]
    async fn test_latest_for_single_gateway() {
        let resolver = resolver().await;
        let gw = GatewayId::parse("bbbbbbbbbbbbbbbb").unwrap();

        let marks = resolver.latest_for(&gw).await.unwrap();
        assert_eq!(marks.len(), 1);
        assert!(marks.contains_key(&gw));

        let unknown = GatewayId::parse("cccccccccccccccc").unwrap();
        assert!(resolver.latest_for(&unknown).await.unwrap().is_empty());
    }
}
