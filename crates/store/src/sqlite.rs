//! SQLite store backend
//!
//! Objects and alerts live in one database file. `alerts.pair_key` carries a
//! UNIQUE constraint and every alert write goes through
//! `INSERT .. ON CONFLICT(pair_key) DO UPDATE`, so two racing upserts for one
//! pair collapse into a single record.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use orbitwatch_domain::{
    Alert, AlertId, Detection, ObjectId, PairKey, Position, TrackedObject,
};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::{AlertStore, PositionStore, UpsertChange, Upserted};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS objects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    lat REAL,
    lon REAL,
    alt_km REAL,
    last_update TEXT,
    norad_id INTEGER,
    operator TEXT,
    country TEXT
);
CREATE INDEX IF NOT EXISTS idx_objects_status ON objects(status);

CREATE TABLE IF NOT EXISTS alerts (
    id TEXT PRIMARY KEY,
    pair_key TEXT NOT NULL UNIQUE,
    a_sat_id TEXT NOT NULL,
    b_sat_id TEXT NOT NULL,
    a_name TEXT NOT NULL,
    b_name TEXT NOT NULL,
    miss_km REAL NOT NULL,
    tca TEXT NOT NULL,
    level TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_open ON alerts(resolved, updated_at);
";

const ALERT_COLUMNS: &str = "id, pair_key, a_sat_id, b_sat_id, a_name, b_name, miss_km, tca, \
                             level, acknowledged, resolved, created_at, updated_at";

const OBJECT_COLUMNS: &str =
    "id, name, status, lat, lon, alt_km, last_update, norad_id, operator, country";

// rusqlite::Connection is not Sync; every call takes the mutex and finishes
// its statements before returning, without awaiting in between.
/// Position and alert store backed by SQLite
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "SQLite store opened");
        Ok(store)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("SQLite connection lock poisoned".to_string()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

struct AlertRow {
    id: String,
    pair_key: String,
    a_sat_id: String,
    b_sat_id: String,
    a_name: String,
    b_name: String,
    miss_km: f64,
    tca: String,
    level: String,
    acknowledged: bool,
    resolved: bool,
    created_at: String,
    updated_at: String,
}

impl AlertRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            pair_key: row.get(1)?,
            a_sat_id: row.get(2)?,
            b_sat_id: row.get(3)?,
            a_name: row.get(4)?,
            b_name: row.get(5)?,
            miss_km: row.get(6)?,
            tca: row.get(7)?,
            level: row.get(8)?,
            acknowledged: row.get(9)?,
            resolved: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_alert(self) -> Result<Alert> {
        // the key is rebuilt from the stored snapshot ids, never re-split
        let a_sat_id = ObjectId::new(self.a_sat_id);
        let b_sat_id = ObjectId::new(self.b_sat_id);
        let pair_key = PairKey::new(&a_sat_id, &b_sat_id)?;
        if pair_key.as_str() != self.pair_key {
            return Err(StoreError::Corrupt(format!(
                "alert {} has pair key '{}' but ids give '{}'",
                self.id, self.pair_key, pair_key
            )));
        }
        Ok(Alert {
            id: self.id.parse()?,
            pair_key,
            a_sat_id,
            b_sat_id,
            a_name: self.a_name,
            b_name: self.b_name,
            miss_km: self.miss_km,
            tca: parse_ts(&self.tca)?,
            level: self.level.parse()?,
            acknowledged: self.acknowledged,
            resolved: self.resolved,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

struct ObjectRow {
    id: String,
    name: String,
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    alt_km: Option<f64>,
    last_update: Option<String>,
    norad_id: Option<u32>,
    operator: Option<String>,
    country: Option<String>,
}

impl ObjectRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            status: row.get(2)?,
            lat: row.get(3)?,
            lon: row.get(4)?,
            alt_km: row.get(5)?,
            last_update: row.get(6)?,
            norad_id: row.get(7)?,
            operator: row.get(8)?,
            country: row.get(9)?,
        })
    }

    fn into_object(self) -> Result<TrackedObject> {
        // a partially stored position is treated as no position
        let position = match (self.lat, self.lon, self.last_update) {
            (Some(lat), Some(lon), Some(last_update)) => Some(Position::new(
                lat,
                lon,
                self.alt_km.unwrap_or(Position::DEFAULT_ALT_KM),
                parse_ts(&last_update)?,
            )),
            _ => None,
        };
        Ok(TrackedObject {
            id: ObjectId::new(self.id),
            name: self.name,
            status: self.status.parse()?,
            position,
            norad_id: self.norad_id,
            operator: self.operator,
            country: self.country,
        })
    }
}

fn query_alert(conn: &Connection, filter: &str, key: &str) -> Result<Option<Alert>> {
    let sql = format!("SELECT {} FROM alerts WHERE {} = ?1", ALERT_COLUMNS, filter);
    conn.query_row(&sql, params![key], AlertRow::from_row)
        .optional()?
        .map(AlertRow::into_alert)
        .transpose()
}

fn query_object(conn: &Connection, id: &ObjectId) -> Result<Option<TrackedObject>> {
    let sql = format!("SELECT {} FROM objects WHERE id = ?1", OBJECT_COLUMNS);
    conn.query_row(&sql, params![id.as_str()], ObjectRow::from_row)
        .optional()?
        .map(ObjectRow::into_object)
        .transpose()
}

fn write_alert(conn: &Connection, alert: &Alert) -> Result<()> {
    conn.execute(
        "INSERT INTO alerts (id, pair_key, a_sat_id, b_sat_id, a_name, b_name, miss_km, tca,
                             level, acknowledged, resolved, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(pair_key) DO UPDATE SET
             a_sat_id = excluded.a_sat_id,
             b_sat_id = excluded.b_sat_id,
             a_name = excluded.a_name,
             b_name = excluded.b_name,
             miss_km = excluded.miss_km,
             tca = excluded.tca,
             level = excluded.level,
             acknowledged = excluded.acknowledged,
             resolved = excluded.resolved,
             updated_at = excluded.updated_at",
        params![
            alert.id.to_string(),
            alert.pair_key.as_str(),
            alert.a_sat_id.as_str(),
            alert.b_sat_id.as_str(),
            alert.a_name,
            alert.b_name,
            alert.miss_km,
            ts(&alert.tca),
            alert.level.as_str(),
            alert.acknowledged,
            alert.resolved,
            ts(&alert.created_at),
            ts(&alert.updated_at),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl PositionStore for SqliteStore {
    async fn list_active(&self) -> Result<Vec<TrackedObject>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM objects WHERE status = 'active' ORDER BY id",
                OBJECT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], ObjectRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(ObjectRow::into_object).collect()
        })
    }

    async fn get_object(&self, id: &ObjectId) -> Result<Option<TrackedObject>> {
        self.with_conn(|conn| query_object(conn, id))
    }

    async fn update_position(&self, id: &ObjectId, position: Position) -> Result<TrackedObject> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE objects SET lat = ?2, lon = ?3, alt_km = ?4, last_update = ?5 WHERE id = ?1",
                params![
                    id.as_str(),
                    position.lat,
                    position.lon,
                    position.alt_km,
                    ts(&position.last_update),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::ObjectNotFound(id.to_string()));
            }
            query_object(conn, id)?.ok_or_else(|| StoreError::ObjectNotFound(id.to_string()))
        })
    }

    async fn upsert_object(&self, object: TrackedObject) -> Result<()> {
        self.with_conn(|conn| {
            let position = object.position.as_ref();
            conn.execute(
                "INSERT INTO objects (id, name, status, lat, lon, alt_km, last_update,
                                      norad_id, operator, country)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     status = excluded.status,
                     lat = excluded.lat,
                     lon = excluded.lon,
                     alt_km = excluded.alt_km,
                     last_update = excluded.last_update,
                     norad_id = excluded.norad_id,
                     operator = excluded.operator,
                     country = excluded.country",
                params![
                    object.id.as_str(),
                    object.name,
                    object.status.as_str(),
                    position.map(|p| p.lat),
                    position.map(|p| p.lon),
                    position.map(|p| p.alt_km),
                    position.map(|p| ts(&p.last_update)),
                    object.norad_id,
                    object.operator,
                    object.country,
                ],
            )?;
            Ok(())
        })
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn find_by_pair_key(&self, key: &PairKey) -> Result<Option<Alert>> {
        self.with_conn(|conn| query_alert(conn, "pair_key", key.as_str()))
    }

    async fn get_alert(&self, id: &AlertId) -> Result<Option<Alert>> {
        self.with_conn(|conn| query_alert(conn, "id", &id.to_string()))
    }

    async fn upsert(&self, detection: Detection, now: DateTime<Utc>) -> Result<Upserted> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let (alert, change) = match query_alert(&tx, "pair_key", detection.pair_key.as_str())? {
                Some(mut existing) => {
                    let change = if existing.apply_detection(detection, now) {
                        UpsertChange::Reopened
                    } else {
                        UpsertChange::Updated
                    };
                    (existing, change)
                }
                None => (Alert::open(detection, now), UpsertChange::Created),
            };
            write_alert(&tx, &alert)?;
            tx.commit()?;
            Ok(Upserted { alert, change })
        })
    }

    async fn mark_resolved(&self, key: &PairKey, now: DateTime<Utc>) -> Result<Option<Alert>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE alerts SET resolved = 1, updated_at = ?2 WHERE pair_key = ?1 AND resolved = 0",
                params![key.as_str(), ts(&now)],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_alert(conn, "pair_key", key.as_str())
        })
    }

    async fn acknowledge(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut alert = query_alert(&tx, "id", &id.to_string())?
                .ok_or_else(|| StoreError::AlertNotFound(id.to_string()))?;
            alert.acknowledge(now)?;
            write_alert(&tx, &alert)?;
            tx.commit()?;
            Ok(alert)
        })
    }

    async fn resolve(&self, id: &AlertId, now: DateTime<Utc>) -> Result<Alert> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut alert = query_alert(&tx, "id", &id.to_string())?
                .ok_or_else(|| StoreError::AlertNotFound(id.to_string()))?;
            if alert.mark_resolved(now) {
                write_alert(&tx, &alert)?;
            }
            tx.commit()?;
            Ok(alert)
        })
    }

    async fn list_open(&self) -> Result<Vec<Alert>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM alerts WHERE resolved = 0 ORDER BY updated_at DESC, pair_key ASC",
                ALERT_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], AlertRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(AlertRow::into_alert).collect()
        })
    }
}
