//! Tracker Payload Codec
//!
//! Pure domain logic for the fixed 20-byte tracker uplink. The firmware
//! packs one GPS fix into five big-endian 32-bit words:
//!
//! | Bytes  | Type | Field                                   |
//! |--------|------|-----------------------------------------|
//! | 0..4   | i32  | latitude, millionths of a degree        |
//! | 4..8   | i32  | longitude, millionths of a degree       |
//! | 8..12  | i32  | altitude, centimeters                   |
//! | 12..16 | u32  | GPS date, `DDMMYY`                      |
//! | 16..20 | u32  | GPS time, `HHMMSSff` (hundredths)       |
//!
//! A GPS time of exactly zero means the tracker had no lock.

use crate::domain::entities::Fix;
use crate::domain::errors::MalformedPayload;
use crate::domain::value_objects::{GeoPoint, Timestamp};
use bytes::{Buf, BufMut};
use chrono::{Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// Exact size of a tracker payload.
pub const PAYLOAD_LEN: usize = 20;

const DEGREE_SCALE: f64 = 1_000_000.0;
const ALTITUDE_SCALE: f64 = 100.0;

/// Largest values that still fit the zero-padded `DDMMYY` / `HHMMSSff` forms.
const MAX_GPS_DATE: u32 = 999_999;
const MAX_GPS_TIME: u32 = 99_999_999;

/// Two-digit years below this pivot belong to the 2000s, the rest to the 1900s.
const CENTURY_PIVOT: u32 = 69;

/// Codec for the tracker payload.
pub struct PayloadCodec;

impl PayloadCodec {
    /// Decode a raw payload into a [`Fix`].
    ///
    /// Fails with [`MalformedPayload`] when the input is not exactly
    /// [`PAYLOAD_LEN`] bytes or the date/time fields do not form a valid
    /// UTC instant. A zero GPS time yields the "no fix" sentinel whatever
    /// the date field holds.
    pub fn decode(raw: &[u8]) -> Result<Fix, MalformedPayload> {
        if raw.len() != PAYLOAD_LEN {
            return Err(MalformedPayload::new(format!(
                "expected {} bytes, got {}",
                PAYLOAD_LEN,
                raw.len()
            )));
        }

        let mut buf = raw;
        let lat = buf.get_i32();
        let lon = buf.get_i32();
        let alt = buf.get_i32();
        let gps_date = buf.get_u32();
        let gps_time = buf.get_u32();

        let location = GeoPoint::new(
            f64::from(lat) / DEGREE_SCALE,
            f64::from(lon) / DEGREE_SCALE,
            f64::from(alt) / ALTITUDE_SCALE,
        );

        if gps_time == 0 {
            return Ok(Fix::no_fix(location));
        }

        let timestamp = parse_gps_instant(gps_date, gps_time)?;
        Ok(Fix::at(location, timestamp))
    }

    /// Encode a [`Fix`]; the exact inverse of [`decode`](Self::decode).
    ///
    /// Sub-hundredth precision is dropped. Fails when a coordinate does not
    /// fit its scaled 32-bit field or the fix year falls outside the
    /// two-digit window (1969..=2068).
    pub fn encode(fix: &Fix) -> Result<[u8; PAYLOAD_LEN], MalformedPayload> {
        let lat = scale(fix.location.latitude, DEGREE_SCALE, "latitude")?;
        let lon = scale(fix.location.longitude, DEGREE_SCALE, "longitude")?;
        let alt = scale(fix.location.altitude, ALTITUDE_SCALE, "altitude")?;

        let (gps_date, gps_time) = match &fix.timestamp {
            Some(ts) => format_gps_instant(ts)?,
            None => (0, 0),
        };

        let mut out = [0u8; PAYLOAD_LEN];
        let mut cursor = &mut out[..];
        cursor.put_i32(lat);
        cursor.put_i32(lon);
        cursor.put_i32(alt);
        cursor.put_u32(gps_date);
        cursor.put_u32(gps_time);
        Ok(out)
    }
}

fn parse_gps_instant(gps_date: u32, gps_time: u32) -> Result<Timestamp, MalformedPayload> {
    if gps_date > MAX_GPS_DATE || gps_time > MAX_GPS_TIME {
        return Err(MalformedPayload::new(format!(
            "gps date/time {}/{} overflow DDMMYY/HHMMSSff",
            gps_date, gps_time
        )));
    }

    let day = gps_date / 10_000;
    let month = (gps_date / 100) % 100;
    let yy = gps_date % 100;
    let year = if yy < CENTURY_PIVOT { 2000 + yy } else { 1900 + yy };

    let hour = gps_time / 1_000_000;
    let minute = (gps_time / 10_000) % 100;
    let second = (gps_time / 100) % 100;
    let hundredths = gps_time % 100;

    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_milli_opt(hour, minute, second, hundredths * 10))
        .ok_or_else(|| {
            MalformedPayload::new(format!(
                "gps date/time {:06} {:08} is not a valid instant",
                gps_date, gps_time
            ))
        })?;

    Ok(Timestamp::new(Utc.from_utc_datetime(&naive)))
}

fn format_gps_instant(ts: &Timestamp) -> Result<(u32, u32), MalformedPayload> {
    let dt = ts.as_datetime();
    let year = dt.year();
    if !(1900 + CENTURY_PIVOT as i32..2000 + CENTURY_PIVOT as i32).contains(&year) {
        return Err(MalformedPayload::new(format!(
            "fix year {} does not fit a two-digit GPS date",
            year
        )));
    }

    let gps_date = dt.day() * 10_000 + dt.month() * 100 + (year % 100) as u32;
    let hundredths = (dt.nanosecond() % 1_000_000_000) / 10_000_000;
    let gps_time = dt.hour() * 1_000_000 + dt.minute() * 10_000 + dt.second() * 100 + hundredths;
    Ok((gps_date, gps_time))
}

fn scale(value: f64, factor: f64, field: &str) -> Result<i32, MalformedPayload> {
    let scaled = (value * factor).round();
    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(MalformedPayload::new(format!(
            "{} {} does not fit the payload field",
            field, value
        )));
    }
    Ok(scaled as i32)
}
