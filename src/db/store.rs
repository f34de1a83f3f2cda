//! SQLite database store implementation.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::models::*;

/// How long check records are kept before the retention task removes them.
pub const RETENTION_DAYS: i64 = 30;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
///
/// All access goes through one long-lived connection guarded by a mutex, so
/// every `append` is a single atomic insert and readers never see a half
/// written row.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.lock();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cheap administrative round-trip that touches no check data.
    pub fn ping(&self) -> Result<(), DbError> {
        let conn = self.lock();
        conn.query_row("PRAGMA schema_version", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }

    // --- Writes ---

    /// Append one check record. No deduplication: every call adds a row.
    pub fn append(&self, record: &UptimeCheckRecord) -> Result<(), DbError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO uptime_checks (service, status, latency, message, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.service.as_str(),
                record.status.as_str(),
                i64::try_from(record.latency).unwrap_or(i64::MAX),
                record.message,
                db_time(record.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Delete every record older than `cutoff`, returning how many went.
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM uptime_checks WHERE timestamp < ?1",
            params![db_time(cutoff)],
        )?;
        Ok(deleted)
    }

    /// Delete everything past the retention window.
    pub fn expire(&self) -> Result<usize, DbError> {
        self.delete_before(Utc::now() - ChronoDuration::days(RETENTION_DAYS))
    }

    // --- Reads ---

    /// Most recent record for a service.
    pub fn latest(&self, service: Service) -> Result<Option<UptimeCheckRecord>, DbError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT service, status, latency, message, timestamp FROM uptime_checks
             WHERE service = ?1 ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![service.as_str()], map_record)?;
        let record = rows.next().transpose()?;
        Ok(record)
    }

    /// Most recent record of every service that has one, in a single query.
    pub fn latest_all(&self) -> Result<Vec<UptimeCheckRecord>, DbError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT service, status, latency, message, timestamp FROM (
                SELECT service, status, latency, message, timestamp,
                       ROW_NUMBER() OVER (PARTITION BY service ORDER BY timestamp DESC, id DESC) AS rn
                FROM uptime_checks
             ) WHERE rn = 1 ORDER BY service",
        )?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Records for a service within the trailing `since_hours`, oldest first.
    /// A window reaching past the representable range returns everything.
    pub fn history(&self, service: Service, since_hours: u32) -> Result<Vec<UptimeCheckRecord>, DbError> {
        let since = ChronoDuration::try_hours(i64::from(since_hours))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.history_since(service, since)
    }

    /// Records for a service at or after `since`, oldest first.
    pub fn history_since(
        &self,
        service: Service,
        since: DateTime<Utc>,
    ) -> Result<Vec<UptimeCheckRecord>, DbError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT service, status, latency, message, timestamp FROM uptime_checks
             WHERE service = ?1 AND timestamp >= ?2 ORDER BY timestamp ASC, id ASC",
        )?;
        let records = stmt
            .query_map(params![service.as_str(), db_time(since)], map_record)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(records)
    }

    /// Total and `up` counts per service since `since`, in one grouped query.
    /// Services without records in the window are absent from the map.
    pub fn uptime_counts(&self, since: DateTime<Utc>) -> Result<HashMap<Service, UptimeCount>, DbError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT service, COUNT(*), SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END)
             FROM uptime_checks WHERE timestamp >= ?1 GROUP BY service",
        )?;
        let counts = stmt
            .query_map(params![db_time(since)], |row| {
                let service = parse_column::<Service>(row, 0)?;
                Ok((
                    service,
                    UptimeCount {
                        total: row.get(1)?,
                        up: row.get(2)?,
                    },
                ))
            })?
            .collect::<SqlResult<HashMap<_, _>>>()?;
        Ok(counts)
    }
}

fn db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn map_record(row: &Row<'_>) -> SqlResult<UptimeCheckRecord> {
    let latency: i64 = row.get(2)?;
    let time_str: String = row.get(4)?;
    let timestamp = parse_db_time(&time_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, format!("bad timestamp: {}", time_str).into())
    })?;

    Ok(UptimeCheckRecord {
        service: parse_column(row, 0)?,
        status: parse_column(row, 1)?,
        latency: u64::try_from(latency).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(2, latency))?,
        message: row.get(3)?,
        timestamp,
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> SqlResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
