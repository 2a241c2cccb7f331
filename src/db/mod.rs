// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/agrotrack

//! Database module for persistent storage
//!
//! Readings and alerts live in two independent append-only tables. Every
//! write goes through one connection behind a mutex, so concurrent appends
//! are serialized here rather than by callers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::detection::{Alert, NewAlert};
use crate::error::{TelemetryError, TelemetryResult};
use crate::sensors::{Location, NewReading, RawReading, Reading};

/// Default page size for recent readings
pub const DEFAULT_READING_LIMIT: usize = 20;

/// Default page size for recent alerts
pub const DEFAULT_ALERT_LIMIT: usize = 10;

/// Resolve a caller-supplied limit; absent or non-positive values use the default
pub fn resolve_limit(limit: Option<i64>, default: usize) -> usize {
    match limit {
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(default),
        _ => default,
    }
}

/// Append-only reading storage
pub trait ReadingStore: Send + Sync {
    /// Validate, stamp and persist a reading. Defaults must already be applied.
    fn append_reading(&self, raw: &RawReading) -> TelemetryResult<Reading>;

    /// Newest first
    fn recent_readings(&self, limit: Option<i64>) -> TelemetryResult<Vec<Reading>>;

    /// Oldest first, inclusive bounds. Unbounded unless both are given.
    fn readings_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> TelemetryResult<Vec<Reading>>;

    fn reading_count(&self) -> TelemetryResult<u64>;

    /// Irreversible; maintenance only
    fn clear_readings(&self) -> TelemetryResult<u64>;

    fn latest_reading(&self) -> TelemetryResult<Option<Reading>> {
        Ok(self.recent_readings(Some(1))?.into_iter().next())
    }
}

/// Append-only alert storage
pub trait AlertStore: Send + Sync {
    fn append_alert(&self, alert: &NewAlert) -> TelemetryResult<Alert>;

    /// Newest first
    fn recent_alerts(&self, limit: Option<i64>) -> TelemetryResult<Vec<Alert>>;

    fn alert_count(&self) -> TelemetryResult<u64>;

    /// Irreversible; maintenance only
    fn clear_alerts(&self) -> TelemetryResult<u64>;
}

/// SQLite-backed store for both collections
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> TelemetryResult<Self> {
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TelemetryError::persistence(format!("cannot create {:?}: {}", parent, e))
            })?;
        }

        let conn = Connection::open(&config.path)?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> TelemetryResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Drop both tables so every later statement fails
    #[cfg(test)]
    pub(crate) fn break_schema(&self) {
        self.conn
            .lock()
            .execute_batch("DROP TABLE readings; DROP TABLE alerts;")
            .unwrap();
    }

    fn from_connection(conn: Connection) -> TelemetryResult<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> TelemetryResult<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp_ms INTEGER NOT NULL,
                soil_moisture REAL NOT NULL,
                temperature REAL NOT NULL,
                humidity REAL NOT NULL,
                crop_health REAL NOT NULL,
                battery_level REAL NOT NULL,
                rain_level REAL NOT NULL,
                obstacle_distance REAL NOT NULL,
                lat REAL NOT NULL,
                lng REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_timestamp ON readings(timestamp_ms);

            CREATE TABLE IF NOT EXISTS alerts (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                timestamp_ms INTEGER NOT NULL,
                alert_type TEXT NOT NULL,
                message TEXT NOT NULL,
                severity TEXT NOT NULL,
                read INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts(timestamp_ms);
        "#,
        )?;

        Ok(())
    }

    /// Row counts for both collections
    pub fn get_stats(&self) -> TelemetryResult<DatabaseStats> {
        Ok(DatabaseStats {
            reading_count: self.reading_count()?,
            alert_count: self.alert_count()?,
        })
    }

    fn count(&self, table: &str) -> TelemetryResult<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    }

    fn clear(&self, table: &str) -> TelemetryResult<u64> {
        let conn = self.conn.lock();
        let deleted = conn.execute(&format!("DELETE FROM {}", table), [])?;
        warn!("Cleared {} rows from {}", deleted, table);
        Ok(deleted as u64)
    }
}

const READING_COLUMNS: &str = "id, timestamp_ms, soil_moisture, temperature, humidity, \
     crop_health, battery_level, rain_level, obstacle_distance, lat, lng";

const ALERT_COLUMNS: &str = "id, timestamp_ms, alert_type, message, severity, read";

impl ReadingStore for Database {
    fn append_reading(&self, raw: &RawReading) -> TelemetryResult<Reading> {
        let new = NewReading::try_from(raw)?;
        let reading = Reading::stamp(&new, Utc::now());

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO readings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                READING_COLUMNS
            ),
            params![
                reading.id,
                reading.timestamp.timestamp_millis(),
                reading.soil_moisture,
                reading.temperature,
                reading.humidity,
                reading.crop_health,
                reading.battery_level,
                reading.rain_level,
                reading.obstacle_distance,
                reading.location.lat,
                reading.location.lng,
            ],
        )?;

        Ok(reading)
    }

    fn recent_readings(&self, limit: Option<i64>) -> TelemetryResult<Vec<Reading>> {
        let limit = resolve_limit(limit, DEFAULT_READING_LIMIT);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM readings ORDER BY timestamp_ms DESC, seq DESC LIMIT ?1",
            READING_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], reading_from_row)?;

        collect(rows)
    }

    fn readings_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> TelemetryResult<Vec<Reading>> {
        let conn = self.conn.lock();

        match (start, end) {
            (Some(start), Some(end)) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM readings WHERE timestamp_ms >= ?1 AND timestamp_ms <= ?2 \
                     ORDER BY timestamp_ms ASC, seq ASC",
                    READING_COLUMNS
                ))?;
                let rows = stmt.query_map(
                    params![start.timestamp_millis(), end.timestamp_millis()],
                    reading_from_row,
                )?;
                collect(rows)
            }
            _ => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM readings ORDER BY timestamp_ms ASC, seq ASC",
                    READING_COLUMNS
                ))?;
                let rows = stmt.query_map([], reading_from_row)?;
                collect(rows)
            }
        }
    }

    fn reading_count(&self) -> TelemetryResult<u64> {
        self.count("readings")
    }

    fn clear_readings(&self) -> TelemetryResult<u64> {
        self.clear("readings")
    }
}

impl AlertStore for Database {
    fn append_alert(&self, new: &NewAlert) -> TelemetryResult<Alert> {
        let alert = Alert::stamp(new, Utc::now());

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO alerts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                ALERT_COLUMNS
            ),
            params![
                alert.id,
                alert.timestamp.timestamp_millis(),
                alert.alert_type.as_str(),
                alert.message,
                alert.severity.as_str(),
                alert.read,
            ],
        )?;

        Ok(alert)
    }

    fn recent_alerts(&self, limit: Option<i64>) -> TelemetryResult<Vec<Alert>> {
        let limit = resolve_limit(limit, DEFAULT_ALERT_LIMIT);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM alerts ORDER BY timestamp_ms DESC, seq DESC LIMIT ?1",
            ALERT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], alert_row)?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?.into_alert()?);
        }
        Ok(alerts)
    }

    fn alert_count(&self) -> TelemetryResult<u64> {
        self.count("alerts")
    }

    fn clear_alerts(&self) -> TelemetryResult<u64> {
        self.clear("alerts")
    }
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> TelemetryResult<Vec<T>> {
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

fn timestamp_from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(1, ms))
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        timestamp: timestamp_from_millis(row.get(1)?)?,
        soil_moisture: row.get(2)?,
        temperature: row.get(3)?,
        humidity: row.get(4)?,
        crop_health: row.get(5)?,
        battery_level: row.get(6)?,
        rain_level: row.get(7)?,
        obstacle_distance: row.get(8)?,
        location: Location {
            lat: row.get(9)?,
            lng: row.get(10)?,
        },
    })
}

/// Alert columns before the enum fields are parsed
struct AlertRow {
    id: String,
    timestamp: DateTime<Utc>,
    alert_type: String,
    message: String,
    severity: String,
    read: bool,
}

impl AlertRow {
    fn into_alert(self) -> TelemetryResult<Alert> {
        Ok(Alert {
            alert_type: self
                .alert_type
                .parse()
                .map_err(|e: String| TelemetryError::persistence(format!("invalid data: {}", e)))?,
            severity: self
                .severity
                .parse()
                .map_err(|e: String| TelemetryError::persistence(format!("invalid data: {}", e)))?,
            id: self.id,
            message: self.message,
            read: self.read,
            timestamp: self.timestamp,
        })
    }
}

fn alert_row(row: &Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        timestamp: timestamp_from_millis(row.get(1)?)?,
        alert_type: row.get(2)?,
        message: row.get(3)?,
        severity: row.get(4)?,
        read: row.get(5)?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    pub reading_count: u64,
    pub alert_count: u64,
}
