//! Telemetry Store Port
//!
//! Defines the interface the sync engine needs from a replica's storage.
//! Implementations may be a local SQLite file, an in-memory map, or another
//! collection point reached over HTTP.

use crate::domain::entities::{TelemetryRecord, WatermarkMap};
use crate::domain::errors::StoreResult;
use crate::domain::value_objects::{GatewayId, Timestamp};
use async_trait::async_trait;

/// Append-only telemetry storage keyed by `(gateway_id, receive_timestamp)`.
///
/// This is an outbound port: the watermark resolver, exchange executor and
/// orchestrator receive it injected as `Arc<dyn TelemetryStore>` and never
/// know whether the replica is local or remote.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Maximum receive timestamp per gateway. An empty store yields an
    /// empty map.
    async fn latest_per_gateway(&self) -> StoreResult<WatermarkMap>;

    /// Records for `gateway_id` received strictly after `after`, oldest first.
    async fn records_since(
        &self,
        gateway_id: &GatewayId,
        after: Timestamp,
    ) -> StoreResult<Vec<TelemetryRecord>>;

    /// Store a batch atomically: every record is stored or none is.
    ///
    /// A record whose `(gateway_id, receive_timestamp)` is already present
    /// must not produce a second visible row. Failure to commit is reported
    /// as [`StoreError::PartialInsert`](crate::domain::errors::StoreError::PartialInsert).
    async fn bulk_insert(&self, records: Vec<TelemetryRecord>) -> StoreResult<()>;

    /// Records after each gateway's since-timestamp, concatenated in gateway
    /// order. Adapters with a batched query override this.
    async fn records_after(&self, since: &WatermarkMap) -> StoreResult<Vec<TelemetryRecord>> {
        let mut batch = Vec::new();
        for (gateway_id, after) in since {
            batch.extend(self.records_since(gateway_id, *after).await?);
        }
        Ok(batch)
    }
}
