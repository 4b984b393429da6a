mod http_replica;
mod memory_telemetry_store;
mod sqlite_telemetry_store;

pub use http_replica::{HttpReplica, HttpReplicaConfig};
pub use memory_telemetry_store::MemoryTelemetryStore;
pub use sqlite_telemetry_store::SqliteTelemetryStore;
