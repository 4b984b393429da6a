//! Domain layer: telemetry records, identifiers, the payload codec and the
//! storage port. No I/O lives here.

pub mod entities;
pub mod errors;
pub mod ports;
pub mod services;
pub mod value_objects;
