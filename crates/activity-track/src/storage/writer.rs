use super::Store;
use super::schema::{self, SCHEMA_VERSION};
use crate::error::{Error, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use track_agent::EventRecord;

/// SQLite-backed event store
pub struct SqliteStore {
    /// `None` once the store has been closed
    conn: Mutex<Option<Connection>>,
}

/// A persisted event with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    #[serde(flatten)]
    pub record: EventRecord,
}

/// Number of stored events per event name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub event: String,
    pub count: u64,
    pub first_ts: i64,
    pub last_ts: i64,
}

impl SqliteStore {
    /// Open (or create) the store file.
    ///
    /// `connect_timeout` bounds how long a locked database is waited on.
    pub fn open(path: &Path, connect_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(connect_timeout)?;

        // Enable WAL mode for concurrent reads during writes
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        if !schema::collection_exists(&conn)? {
            tracing::info!(collection = schema::COLLECTION, "creating collection");
        }
        schema::create_tables(&conn)?;

        schema::set_meta(&conn, "version", &SCHEMA_VERSION.to_string())?;
        schema::init_meta(&conn, "created_at", &chrono::Utc::now().to_rfc3339())?;

        Ok(SqliteStore {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(Error::StoreClosed)?;
        f(conn)
    }

    /// Close the connection. Later operations fail with [`Error::StoreClosed`].
    pub fn close(&self) -> Result<()> {
        let Some(conn) = self.lock().take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| Error::Close(e))
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Get number of stored events
    pub fn count(&self) -> Result<u64> {
        self.with_conn(|conn| query_count(conn))
    }

    /// Most recent events, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        self.with_conn(|conn| query_recent(conn, limit))
    }

    pub fn summary(&self) -> Result<Vec<EventSummary>> {
        self.with_conn(|conn| query_summary(conn))
    }
}

impl Store for SqliteStore {
    fn insert_one(&self, record: &EventRecord) -> Result<()> {
        self.with_conn(|conn| {
            insert(conn, record)?;
            Ok(())
        })
    }

    fn insert_many(&self, records: &[EventRecord]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for record in records {
                insert(&tx, record)?;
            }
            tx.commit()?;
            Ok(())
        })
    }
}

fn insert(conn: &Connection, record: &EventRecord) -> Result<()> {
    let tags = serde_json::to_string(&record.tags)?;
    let ts = i64::try_from(record.ts)
        .map_err(|_| Error::InvalidArgument(format!("timestamp out of range: {}", record.ts)))?;

    let mut stmt = conn.prepare_cached(
        "INSERT INTO tracks (event, tags, url, title, ts) VALUES (?, ?, ?, ?, ?)",
    )?;
    stmt.execute(rusqlite::params![
        &record.event,
        tags,
        &record.url,
        &record.title,
        ts
    ])?;
    Ok(())
}

pub fn query_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Query the most recent events (by insertion order), newest first
pub fn query_recent(conn: &Connection, limit: usize) -> Result<Vec<StoredEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, event, tags, url, title, ts FROM tracks ORDER BY id DESC LIMIT ?",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (id, event, tags, url, title, ts) = row?;
        let tags: Vec<String> = serde_json::from_str(&tags)?;
        events.push(StoredEvent {
            id,
            record: EventRecord::with_ts(event, tags, url, title, ts.max(0) as u64),
        });
    }
    Ok(events)
}

/// Query per-event counts, most frequent first
pub fn query_summary(conn: &Connection) -> Result<Vec<EventSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT event, COUNT(*) AS n, MIN(ts), MAX(ts)
        FROM tracks
        GROUP BY event
        ORDER BY n DESC, event ASC
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(EventSummary {
            event: row.get(0)?,
            count: row.get::<_, i64>(1)? as u64,
            first_ts: row.get(2)?,
            last_ts: row.get(3)?,
        })
    })?;

    let summary = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summary)
}
