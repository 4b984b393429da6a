//! SQLite Telemetry Store
//!
//! Implements TelemetryStore using SQLite for storage.
//! Both hot-path queries (latest per gateway, rows after a timestamp) are
//! served by the `(gateway_id, rx_time_us)` unique index.

use crate::domain::entities::{Fix, TelemetryRecord, WatermarkMap};
use crate::domain::errors::{StoreError, StoreResult, TimestampFormatError};
use crate::domain::ports::TelemetryStore;
use crate::domain::value_objects::{DeviceId, GatewayId, GeoPoint, Timestamp};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracker_data (
        id INTEGER PRIMARY KEY,
        gateway_id TEXT NOT NULL,
        gw_lat REAL NOT NULL,
        gw_lon REAL NOT NULL,
        gw_alt REAL NOT NULL,
        gw_srid INTEGER NOT NULL,
        application_id INTEGER NOT NULL,
        device_id TEXT NOT NULL,
        rx_time_us INTEGER NOT NULL,
        rx_rssi INTEGER NOT NULL,
        rx_snr REAL NOT NULL,
        fix_time_us INTEGER,
        fix_lat REAL NOT NULL,
        fix_lon REAL NOT NULL,
        fix_alt REAL NOT NULL,
        fix_srid INTEGER NOT NULL,
        UNIQUE (gateway_id, rx_time_us)
    );
    CREATE INDEX IF NOT EXISTS tracker_data_device ON tracker_data (device_id, rx_time_us);
";

const SELECT_COLUMNS: &str = "SELECT gateway_id, gw_lat, gw_lon, gw_alt, gw_srid, application_id,
            device_id, rx_time_us, rx_rssi, rx_snr, fix_time_us, fix_lat, fix_lon, fix_alt, fix_srid
     FROM tracker_data";

// Duplicates of (gateway_id, rx_time_us) are ignored, not errors.
const INSERT: &str = "INSERT OR IGNORE INTO tracker_data
     (gateway_id, gw_lat, gw_lon, gw_alt, gw_srid, application_id, device_id,
      rx_time_us, rx_rssi, rx_snr, fix_time_us, fix_lat, fix_lon, fix_alt, fix_srid)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

/// SQLite-backed telemetry store.
///
/// Holds one connection behind a mutex; every query runs on the blocking
/// thread pool. Each `bulk_insert` is a single transaction.
#[derive(Clone)]
pub struct SqliteTelemetryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTelemetryStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open(db_path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {}", e)))?
    }

    /// Convert a SQLite row to a TelemetryRecord entity.
    fn row_to_record(row: &Row) -> rusqlite::Result<TelemetryRecord> {
        let fix_time: Option<i64> = row.get(10)?;

        Ok(TelemetryRecord {
            gateway_id: GatewayId::parse(&row.get::<_, String>(0)?)
                .map_err(|e| conversion_error(0, e))?,
            gateway_location: GeoPoint {
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                altitude: row.get(3)?,
                srid: row.get(4)?,
            },
            application_id: row.get(5)?,
            device_id: DeviceId::parse(&row.get::<_, String>(6)?)
                .map_err(|e| conversion_error(6, e))?,
            receive_timestamp: micros_column(7, row.get(7)?)?,
            receive_signal_strength: row.get(8)?,
            receive_snr: row.get(9)?,
            fix: Fix {
                location: GeoPoint {
                    latitude: row.get(11)?,
                    longitude: row.get(12)?,
                    altitude: row.get(13)?,
                    srid: row.get(14)?,
                },
                timestamp: fix_time.map(|us| micros_column(10, us)).transpose()?,
            },
        })
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn micros_column(idx: usize, micros: i64) -> rusqlite::Result<Timestamp> {
    Timestamp::from_micros(micros).ok_or_else(|| {
        conversion_error(
            idx,
            TimestampFormatError::new(micros.to_string(), "microseconds out of range"),
        )
    })
}

fn query_error(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
            StoreError::InvalidData(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn insert_batch(conn: &mut Connection, records: &[TelemetryRecord]) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(INSERT)?;
        for r in records {
            stmt.execute(params![
                r.gateway_id.to_string(),
                r.gateway_location.latitude,
                r.gateway_location.longitude,
                r.gateway_location.altitude,
                r.gateway_location.srid,
                r.application_id,
                r.device_id.to_string(),
                r.receive_timestamp.micros(),
                r.receive_signal_strength,
                r.receive_snr,
                r.fix.timestamp.map(|ts| ts.micros()),
                r.fix.location.latitude,
                r.fix.location.longitude,
                r.fix.location.altitude,
                r.fix.location.srid,
            ])?;
        }
    }
    // Dropping an uncommitted transaction rolls it back.
    tx.commit()
}

#[async_trait]
impl TelemetryStore for SqliteTelemetryStore {
    async fn latest_per_gateway(&self) -> StoreResult<WatermarkMap> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT gateway_id, MAX(rx_time_us) FROM tracker_data GROUP BY gateway_id",
                )
                .map_err(query_error)?;

            let rows = stmt
                .query_map([], |row| {
                    let gw = GatewayId::parse(&row.get::<_, String>(0)?)
                        .map_err(|e| conversion_error(0, e))?;
                    Ok((gw, micros_column(1, row.get(1)?)?))
                })
                .map_err(query_error)?;

            rows.collect::<rusqlite::Result<WatermarkMap>>()
                .map_err(query_error)
        })
        .await
    }

    async fn records_since(
        &self,
        gateway_id: &GatewayId,
        after: Timestamp,
    ) -> StoreResult<Vec<TelemetryRecord>> {
        let gateway_id = gateway_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare_cached(&format!(
                    "{} WHERE gateway_id = ?1 AND rx_time_us > ?2 ORDER BY rx_time_us",
                    SELECT_COLUMNS
                ))
                .map_err(query_error)?;

            let records = stmt
                .query_map(params![gateway_id, after.micros()], |row| {
                    Self::row_to_record(row)
                })
                .map_err(query_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(query_error)?;

            Ok(records)
        })
        .await
    }

    async fn bulk_insert(&self, records: Vec<TelemetryRecord>) -> StoreResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let attempted = records.len();
        self.with_conn(move |conn| {
            insert_batch(conn, &records).map_err(|e| StoreError::PartialInsert {
                attempted,
                reason: e.to_string(),
            })
        })
        .await?;

        tracing::debug!("stored batch of {} records", attempted);
        Ok(())
    }
}
