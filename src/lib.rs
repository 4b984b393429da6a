//! LoRa Tracker Library
//!
//! Telemetry collection for LoRaWAN GPS trackers: payload decoding, storage,
//! an HTTP API, and watermark-based anti-entropy sync between collection
//! points. Exposed as a library for integration tests and embedding.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod replication;

// Re-export commonly used types
pub use application::IngestService;
pub use config::{load_config, Config, StoreKind};
pub use domain::entities::{Fix, TelemetryRecord, WatermarkMap};
pub use domain::errors::{MalformedPayload, StoreError};
pub use domain::ports::TelemetryStore;
pub use domain::services::PayloadCodec;
pub use domain::value_objects::{DeviceId, GatewayId, GeoPoint, Timestamp};
pub use replication::{SyncAgent, SyncConfig, SyncOrchestrator};
