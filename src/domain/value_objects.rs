//! Value Objects - Immutable domain primitives
//!
//! Identifiers, instants and positions shared by telemetry records and the
//! sync protocol. Each one is validated once, on construction, so the rest
//! of the crate never sees an unchecked identifier or timestamp.

use crate::domain::errors::{IdentifierFormatError, TimestampFormatError};
use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Rendered length of an EUI-64 identifier.
pub const IDENTIFIER_HEX_LEN: usize = 16;

/// SRID for WGS 84 geographic 3D coordinates (lat, lon, ellipsoidal height).
pub const DEFAULT_SRID: u32 = 4979;

/// Wire format of a [`Timestamp`]: microsecond precision, explicit UTC offset.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f+00:00";

/// Check that `s` is exactly 16 hex digits of either case.
pub fn is_valid_identifier(s: &str) -> bool {
    s.len() == IDENTIFIER_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_identifier(s: &str) -> Result<[u8; 8], IdentifierFormatError> {
    if !is_valid_identifier(s) {
        return Err(IdentifierFormatError::new(s));
    }

    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
            .map_err(|_| IdentifierFormatError::new(s))?;
    }
    Ok(bytes)
}

macro_rules! eui64_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; 8]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 8]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 8] {
                &self.0
            }

            /// Parse 16 hex digits of either case.
            pub fn parse(s: &str) -> Result<Self, IdentifierFormatError> {
                parse_identifier(s).map(Self)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierFormatError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

eui64_identifier!(
    /// LoRaWAN gateway EUI. The partition key of the sync protocol.
    ///
    /// Always rendered as 16 lowercase hex digits, so the same gateway
    /// reported in different case by two replicas is one partition.
    GatewayId
);

eui64_identifier!(
    /// Tracker DevEUI.
    DeviceId
);

/// A UTC instant with microsecond precision.
///
/// Anything finer is truncated on construction, so a timestamp survives the
/// wire format and the store unchanged. This is the replication ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant.trunc_subsecs(6))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// The minimum representable instant, `0001-01-01T00:00:00+00:00`.
    ///
    /// Used as the since-timestamp when a replica has never seen a gateway.
    pub fn minimum() -> Self {
        let floor = Utc
            .with_ymd_and_hms(1, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self(floor)
    }

    /// Parse any RFC 3339 instant and normalise it to UTC.
    pub fn parse(s: &str) -> Result<Self, TimestampFormatError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self::new(dt.with_timezone(&Utc)))
            .map_err(|e| TimestampFormatError::new(s, e.to_string()))
    }

    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_micros(micros).map(Self)
    }

    pub fn micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as strict ISO-8601, e.g. `2019-01-03T22:48:16.080583+00:00`.
    pub fn to_iso(&self) -> String {
        self.0.format(ISO_FORMAT).to_string()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::new(instant)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

// Rendered explicitly: a generic timestamp encoding may drop sub-second digits.
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A 3D position: decimal degrees plus altitude in meters.
///
/// Serialized positionally as `[latitude, longitude, altitude, srid]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64, u32)", into = "(f64, f64, f64, u32)")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    pub srid: u32,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            srid: DEFAULT_SRID,
        }
    }

    pub fn with_srid(mut self, srid: u32) -> Self {
        self.srid = srid;
        self
    }
}

impl From<(f64, f64, f64, u32)> for GeoPoint {
    fn from((latitude, longitude, altitude, srid): (f64, f64, f64, u32)) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            srid,
        }
    }
}

impl From<GeoPoint> for (f64, f64, f64, u32) {
    fn from(point: GeoPoint) -> Self {
        (point.latitude, point.longitude, point.altitude, point.srid)
    }
}

/// Gateway selector accepted by the watermark query.
///
/// `Own` is the gateway this collection point is configured as; callers
/// resolve it before reaching the watermark resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFilter {
    Own,
    Gateway(GatewayId),
    All,
}

impl FromStr for GatewayFilter {
    type Err = IdentifierFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::Own),
            "all" => Ok(Self::All),
            other => GatewayId::parse(other).map(Self::Gateway),
        }
    }
}
