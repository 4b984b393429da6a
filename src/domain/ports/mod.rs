mod telemetry_store;

pub use telemetry_store::TelemetryStore;
