//! Programme persistence.
//!
//! The store is keyed by unique start time. Rows are created by ingestion,
//! have their filepath set exactly once by the assembly planner, and are
//! never deleted.

use crate::error::{ArchiveError, Result};
use crate::programme::Programme;
use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Text form of stored timestamps. Lexical order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CURRENT_SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS programmes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time  TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    subtitle    TEXT,
    filepath    TEXT
);
CREATE INDEX IF NOT EXISTS idx_programmes_pending
    ON programmes (start_time) WHERE filepath IS NULL;
";

pub trait ScheduleStore {
    /// Insert a programme. Fails with `DuplicateKey` when its start time is
    /// already taken. Returns the new row id.
    fn upsert(&mut self, programme: &Programme) -> Result<i64>;

    /// Unassembled programmes starting strictly inside the window, oldest first.
    fn list_pending(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Result<Vec<Programme>>;

    /// Start of the first programme after `after`, assembled or not.
    fn next_start_after(&self, after: NaiveDateTime) -> Result<Option<NaiveDateTime>>;

    /// Record the assembled artifact for a pending programme.
    fn set_filepath(&mut self, id: i64, path: &Path) -> Result<()>;

    /// The most recent `limit` programmes, oldest first.
    fn list_recent(&self, limit: usize) -> Result<Vec<Programme>>;
}

// ── SQLite ──────────────────────────────────────────────────────────────────

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let conn = Connection::open(path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }
        let store = Self::from_connection(conn)?;
        info!("Schedule store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(SqliteStore { conn })
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version > CURRENT_SCHEMA_VERSION {
        return Err(ArchiveError::Storage(format!(
            "database version ({version}) is newer than supported schema ({CURRENT_SCHEMA_VERSION})"
        )));
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_V1)?;
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    tx.commit()?;
    debug!("Migrated schedule store to version {CURRENT_SCHEMA_VERSION}");
    Ok(())
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(text: &str) -> std::result::Result<NaiveDateTime, rusqlite::Error> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_programme(row: &Row) -> std::result::Result<Programme, rusqlite::Error> {
    let start_text: String = row.get("start_time")?;
    let start_time = parse_timestamp(&start_text)?;
    let filepath: Option<String> = row.get("filepath")?;
    Ok(Programme {
        id: Some(row.get("id")?),
        start_time,
        end_time: start_time + Duration::hours(1),
        title: row.get("name")?,
        subtitle: row.get("subtitle")?,
        filepath: filepath.map(PathBuf::from),
    })
}

impl ScheduleStore for SqliteStore {
    fn upsert(&mut self, programme: &Programme) -> Result<i64> {
        let inserted = self.conn.execute(
            "INSERT INTO programmes (start_time, name, subtitle) VALUES (?1, ?2, ?3)",
            params![
                format_timestamp(programme.start_time),
                programme.title,
                programme.subtitle,
            ],
        );
        match inserted {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(ArchiveError::DuplicateKey(programme.start_time))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_pending(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Result<Vec<Programme>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, name, subtitle, filepath
             FROM programmes
             WHERE filepath IS NULL
               AND start_time > ?1
               AND start_time < ?2
             ORDER BY start_time ASC",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(window_start), format_timestamp(window_end)],
            row_to_programme,
        )?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn next_start_after(&self, after: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        let next: Option<String> = self
            .conn
            .query_row(
                "SELECT start_time FROM programmes
                 WHERE start_time > ?1
                 ORDER BY start_time ASC
                 LIMIT 1",
                params![format_timestamp(after)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(next.as_deref().map(parse_timestamp).transpose()?)
    }

    fn set_filepath(&mut self, id: i64, path: &Path) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE programmes SET filepath = ?1 WHERE id = ?2 AND filepath IS NULL",
            params![path.to_string_lossy().into_owned(), id],
        )?;
        if updated == 0 {
            return Err(ArchiveError::Storage(format!(
                "programme {id} is missing or already assembled"
            )));
        }
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Programme>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, name, subtitle, filepath FROM (
                 SELECT * FROM programmes ORDER BY start_time DESC LIMIT ?1
             ) ORDER BY start_time ASC",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], row_to_programme)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

// ── In-memory ───────────────────────────────────────────────────────────────

/// Vector-backed store with the same contract, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    programmes: Vec<Programme>,
    next_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<&Programme> {
        self.programmes.iter().find(|p| p.id == Some(id))
    }

    pub fn all(&self) -> &[Programme] {
        &self.programmes
    }
}

impl ScheduleStore for InMemoryStore {
    fn upsert(&mut self, programme: &Programme) -> Result<i64> {
        if self
            .programmes
            .iter()
            .any(|p| p.start_time == programme.start_time)
        {
            return Err(ArchiveError::DuplicateKey(programme.start_time));
        }
        self.next_id += 1;
        let mut stored = programme.clone();
        stored.id = Some(self.next_id);
        stored.filepath = None;
        self.programmes.push(stored);
        self.programmes.sort_by_key(|p| p.start_time);
        Ok(self.next_id)
    }

    fn list_pending(
        &self,
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
    ) -> Result<Vec<Programme>> {
        Ok(self
            .programmes
            .iter()
            .filter(|p| !p.is_assembled())
            .filter(|p| p.start_time > window_start && p.start_time < window_end)
            .cloned()
            .collect())
    }

    fn next_start_after(&self, after: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        Ok(self
            .programmes
            .iter()
            .map(|p| p.start_time)
            .find(|&start| start > after))
    }

    fn set_filepath(&mut self, id: i64, path: &Path) -> Result<()> {
        let programme = self
            .programmes
            .iter_mut()
            .find(|p| p.id == Some(id) && !p.is_assembled())
            .ok_or_else(|| {
                ArchiveError::Storage(format!("programme {id} is missing or already assembled"))
            })?;
        programme.filepath = Some(path.to_path_buf());
        Ok(())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Programme>> {
        let skip = self.programmes.len().saturating_sub(limit);
        Ok(self.programmes[skip..].to_vec())
    }
}
