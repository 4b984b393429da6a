//! Domain Errors
//!
//! Error kinds raised at the domain boundary: payload decoding, identifier
//! and timestamp validation, and the store port.

use thiserror::Error;

/// A tracker payload (or the uplink envelope carrying it) could not be
/// decoded. Never accompanied by a partially populated record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed payload: {reason}")]
pub struct MalformedPayload {
    pub reason: String,
}

impl MalformedPayload {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A gateway or device identifier is not exactly 16 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid identifier {value:?}: expected 16 hex digits")]
pub struct IdentifierFormatError {
    pub value: String,
}

impl IdentifierFormatError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// A timestamp could not be parsed or represented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {value:?}: {reason}")]
pub struct TimestampFormatError {
    pub value: String,
    pub reason: String,
}

impl TimestampFormatError {
    pub fn new(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by a [`TelemetryStore`](crate::domain::ports::TelemetryStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store (or the transport in front of it) could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An atomic bulk insert did not commit; none of the batch was applied.
    #[error("bulk insert of {attempted} records rolled back: {reason}")]
    PartialInsert { attempted: usize, reason: String },

    /// Data read from the store or its transport failed validation.
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
