use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::DateTime;
use rusqlite::{params, Connection};
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{HistoryRecord, RecordKind};

use super::{Error, HistoryStore, Result};

// Consts

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS history (
    id TEXT PRIMARY KEY,
    password TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    kind TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_history_created_at ON history(created_at);
";

// SqliteHistoryStore

/// Store persisted in a SQLite database.
///
/// `created_at` is stored as microseconds since the Unix epoch so that the
/// newest-first ordering is done by the database.
#[derive(Clone)]
pub struct SqliteHistoryStore(Arc<Mutex<Connection>>);

impl SqliteHistoryStore {
    /// Opens (or creates) the database at `path` and creates the schema.
    #[instrument(skip(path), fields(db.path = %path.as_ref().display()))]
    pub fn open<PATH: AsRef<Path>>(path: PATH) -> Result<Self> {
        debug!("opening history database");
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self(Arc::new(Mutex::new(conn))))
    }
}

impl HistoryStore for SqliteHistoryStore {
    #[instrument(skip(self, record), fields(record.id = %record.id))]
    async fn append(&self, record: &HistoryRecord) -> Result {
        debug!("inserting record");
        let conn = self.0.clone();
        let record = record.clone();
        spawn_blocking(move || -> Result {
            let conn = conn.lock().map_err(|_| Error::Poisoned)?;
            conn.execute(
                "INSERT INTO history (id, password, created_at, kind) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    record.password,
                    record.created_at.timestamp_micros(),
                    record.kind.as_str(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    #[instrument(skip(self))]
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryRecord>> {
        debug!("selecting recent records");
        let conn = self.0.clone();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        spawn_blocking(move || -> Result<Vec<HistoryRecord>> {
            let conn = conn.lock().map_err(|_| Error::Poisoned)?;
            let mut stmt = conn.prepare(
                "SELECT id, password, created_at, kind FROM history
                ORDER BY created_at DESC, rowid DESC
                LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let records = rows
                .map(|row| {
                    let (id, password, created_at, kind) = row?;
                    record_from_columns(&id, password, created_at, kind)
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(records)
        })
        .await?
    }
}

// Functions

fn record_from_columns(
    id: &str,
    password: String,
    created_at: i64,
    kind: String,
) -> Result<HistoryRecord> {
    let created_at =
        DateTime::from_timestamp_micros(created_at).ok_or(Error::InvalidTimestamp(created_at))?;
    let kind = RecordKind::parse(&kind).ok_or(Error::UnknownKind(kind))?;
    Ok(HistoryRecord {
        created_at,
        id: Uuid::parse_str(id)?,
        kind,
        password,
    })
}

// Tests
