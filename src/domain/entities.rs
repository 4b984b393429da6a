//! Domain Entities - Core business objects
//!
//! The telemetry record is the unit of replication: created once at ingest,
//! never mutated, copied (never moved) between replicas.

use crate::domain::value_objects::{DeviceId, GatewayId, GeoPoint, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Most recent receive timestamp per gateway at one replica.
///
/// Recomputed every sync pass and never persisted. Ordered by gateway so
/// plans and batches are deterministic.
pub type WatermarkMap = BTreeMap<GatewayId, Timestamp>;

/// A decoded GPS fix from a tracker uplink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub location: GeoPoint,
    /// GPS time of the fix. `None` is the "no fix" sentinel: the tracker
    /// reported no GPS lock and `location` carries no meaning.
    pub timestamp: Option<Timestamp>,
}

impl Fix {
    pub fn at(location: GeoPoint, timestamp: Timestamp) -> Self {
        Self {
            location,
            timestamp: Some(timestamp),
        }
    }

    pub fn no_fix(location: GeoPoint) -> Self {
        Self {
            location,
            timestamp: None,
        }
    }

    pub fn is_no_fix(&self) -> bool {
        self.timestamp.is_none()
    }
}

/// One tracker uplink as heard by one gateway.
///
/// `(gateway_id, receive_timestamp)` identifies a record for replication;
/// two records sharing that pair are duplicates.
///
/// On the wire a record is a positional array in field order, with `null`
/// standing in for the fix timestamp when there was no fix:
///
/// ```text
/// [gateway_id, gateway_location, application_id, device_id,
///  receive_timestamp, receive_signal_strength, receive_snr,
///  fix_timestamp, fix_location]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordTuple", into = "RecordTuple")]
pub struct TelemetryRecord {
    pub gateway_id: GatewayId,
    pub gateway_location: GeoPoint,
    /// Network-server application, passed through untouched
    pub application_id: i64,
    pub device_id: DeviceId,
    pub receive_timestamp: Timestamp,
    /// RSSI in dBm
    pub receive_signal_strength: i32,
    pub receive_snr: f64,
    pub fix: Fix,
}

impl TelemetryRecord {
    /// Replication identity of this record.
    pub fn key(&self) -> (GatewayId, Timestamp) {
        (self.gateway_id, self.receive_timestamp)
    }
}

#[derive(Serialize, Deserialize)]
struct RecordTuple(
    GatewayId,
    GeoPoint,
    i64,
    DeviceId,
    Timestamp,
    i32,
    f64,
    Option<Timestamp>,
    GeoPoint,
);

impl From<TelemetryRecord> for RecordTuple {
    fn from(r: TelemetryRecord) -> Self {
        Self(
            r.gateway_id,
            r.gateway_location,
            r.application_id,
            r.device_id,
            r.receive_timestamp,
            r.receive_signal_strength,
            r.receive_snr,
            r.fix.timestamp,
            r.fix.location,
        )
    }
}

impl From<RecordTuple> for TelemetryRecord {
    fn from(t: RecordTuple) -> Self {
        Self {
            gateway_id: t.0,
            gateway_location: t.1,
            application_id: t.2,
            device_id: t.3,
            receive_timestamp: t.4,
            receive_signal_strength: t.5,
            receive_snr: t.6,
            fix: Fix {
                timestamp: t.7,
                location: t.8,
            },
        }
    }
}
