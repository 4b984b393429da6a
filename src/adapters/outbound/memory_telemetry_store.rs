//! In-Memory Telemetry Store
//!
//! Implements TelemetryStore with one ordered map per gateway.
//! Useful for ephemeral collection points and tests.

use crate::domain::entities::{TelemetryRecord, WatermarkMap};
use crate::domain::errors::StoreResult;
use crate::domain::ports::TelemetryStore;
use crate::domain::value_objects::{GatewayId, Timestamp};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

type Partition = BTreeMap<Timestamp, TelemetryRecord>;

/// In-memory telemetry store.
///
/// Records are partitioned by gateway and keyed by receive timestamp, so a
/// duplicate `(gateway_id, receive_timestamp)` keeps the first copy. A batch
/// is applied under a single write lock.
#[derive(Default)]
pub struct MemoryTelemetryStore {
    partitions: RwLock<BTreeMap<GatewayId, Partition>>,
}

impl MemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.partitions.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TelemetryStore for MemoryTelemetryStore {
    async fn latest_per_gateway(&self) -> StoreResult<WatermarkMap> {
        Ok(self
            .partitions
            .read()
            .iter()
            .filter_map(|(gw, partition)| partition.keys().next_back().map(|ts| (*gw, *ts)))
            .collect())
    }

    async fn records_since(
        &self,
        gateway_id: &GatewayId,
        after: Timestamp,
    ) -> StoreResult<Vec<TelemetryRecord>> {
        Ok(self
            .partitions
            .read()
            .get(gateway_id)
            .map(|partition| {
                partition
                    .range((Bound::Excluded(after), Bound::Unbounded))
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn bulk_insert(&self, records: Vec<TelemetryRecord>) -> StoreResult<()> {
        let mut partitions = self.partitions.write();
        for record in records {
            partitions
                .entry(record.gateway_id)
                .or_default()
                .entry(record.receive_timestamp)
                .or_insert(record);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::Fix;
    use crate::domain::value_objects::{DeviceId, GeoPoint};

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

    #[tokio::test]
    async fn test_empty_store_has_empty_watermarks() {
        let store = MemoryTelemetryStore::new();
        assert!(store.latest_per_gateway().await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_latest_per_gateway() {
        let store = MemoryTelemetryStore::new();
        store
            .bulk_insert(vec![
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:00:00Z"),
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:05:00Z"),
                record("bbbbbbbbbbbbbbbb", "2024-01-01T00:01:00Z"),
            ])
            .await
            .unwrap();

        let marks = store.latest_per_gateway().await.unwrap();
        assert_eq!(marks.len(), 2);
        assert_eq!(
            marks[&GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap()],
            Timestamp::parse("2024-01-01T00:05:00Z").unwrap()
        );
    }

    #[tokio::test]
    async fn test_records_since_is_strict_and_ordered() {
        let store = MemoryTelemetryStore::new();
        store
            .bulk_insert(vec![
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:02:00Z"),
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:01:00Z"),
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:03:00Z"),
            ])
            .await
            .unwrap();

        let gw = GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap();
        let since = store
            .records_since(&gw, Timestamp::parse("2024-01-01T00:01:00Z").unwrap())
            .await
            .unwrap();
        let times: Vec<String> = since.iter().map(|r| r.receive_timestamp.to_iso()).collect();
        assert_eq!(
            times,
            vec![
                "2024-01-01T00:02:00.000000+00:00",
                "2024-01-01T00:03:00.000000+00:00"
            ]
        );
    }

    #[tokio::test]
    async fn test_records_since_unknown_gateway() {
        let store = MemoryTelemetryStore::new();
        let gw = GatewayId::parse("cccccccccccccccc").unwrap();
        assert!(store.records_since(&gw, Timestamp::minimum()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_idempotent() {
        let store = MemoryTelemetryStore::new();
        let r = record("aaaaaaaaaaaaaaaa", "2024-01-01T00:00:00Z");

        store.bulk_insert(vec![r.clone()]).await.unwrap();
        let before = store.latest_per_gateway().await.unwrap();
        store.bulk_insert(vec![r.clone(), r]).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.latest_per_gateway().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_records_after_concatenates_by_gateway() {
        let store = MemoryTelemetryStore::new();
        store
            .bulk_insert(vec![
                record("bbbbbbbbbbbbbbbb", "2024-01-01T00:01:00Z"),
                record("aaaaaaaaaaaaaaaa", "2024-01-01T00:02:00Z"),
            ])
            .await
            .unwrap();

        let mut since = WatermarkMap::new();
        since.insert(GatewayId::parse("bbbbbbbbbbbbbbbb").unwrap(), Timestamp::minimum());
        since.insert(GatewayId::parse("aaaaaaaaaaaaaaaa").unwrap(), Timestamp::minimum());

        let batch = store.records_after(&since).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].gateway_id.to_string(), "aaaaaaaaaaaaaaaa");
        assert_eq!(batch[1].gateway_id.to_string(), "bbbbbbbbbbbbbbbb");
    }
}
