//! SQLite persistence for session records.
//!
//! One table, one row per detected session. Timestamps are stored as RFC 3339
//! UTC text so rows sort and read back without a schema-level date type.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{SessionFilter, SessionStore};
use crate::error::StoreError;
use crate::types::{SessionId, SessionRecord};

const SELECT_COLUMNS: &str = "SELECT id, host_ip, client_ip, start_time, end_time FROM rdp_sessions";

#[derive(Debug)]
pub struct SqliteSessionStore {
    path: PathBuf,
    read_only: bool,
}

impl SqliteSessionStore {
    /// Opens the database for writing, creating it and its schema on demand.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            read_only: false,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an existing database for reporting. Nothing is created and
    /// every write fails with [`StoreError::Unavailable`].
    pub fn open_read_only(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if !path.is_file() {
            return Err(StoreError::Unavailable(format!(
                "Session database {} does not exist",
                path.display()
            )));
        }
        let store = Self {
            path,
            read_only: true,
        };
        store.with_connection(|_| Ok(()))?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_session(&self, id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.0],
                record_from_row,
            )
            .optional()
            .map_err(|err| store_error("query session", err))
        })
    }

    /// Lists records newest first.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, StoreError> {
        let where_clause = if filter.open_only {
            " WHERE end_time IS NULL"
        } else {
            ""
        };
        // SQLite treats a negative LIMIT as unbounded.
        let limit = filter
            .limit
            .map(|value| i64::try_from(value).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "{SELECT_COLUMNS}{where_clause} ORDER BY id DESC LIMIT ?1"
                ))
                .map_err(|err| store_error("prepare sessions query", err))?;

            let rows = stmt
                .query_map(params![limit], record_from_row)
                .map_err(|err| store_error("query sessions", err))?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|err| store_error("decode session row", err))?);
            }
            Ok(sessions)
        })
    }

    pub fn open_session_count(&self) -> Result<u64, StoreError> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM rdp_sessions WHERE end_time IS NULL",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|count| count.max(0) as u64)
            .map_err(|err| store_error("count open sessions", err))
        })
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute_batch(
                "BEGIN;
                 CREATE TABLE IF NOT EXISTS rdp_sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    host_ip TEXT NOT NULL CHECK (length(host_ip) > 0),
                    client_ip TEXT NOT NULL CHECK (length(client_ip) > 0),
                    start_time TEXT NOT NULL,
                    end_time TEXT
                 );
                 CREATE INDEX IF NOT EXISTS rdp_sessions_open
                    ON rdp_sessions (end_time) WHERE end_time IS NULL;
                 COMMIT;",
            )
            .map_err(|err| store_error("initialize schema", err))
        })
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.connect()?;
        op(&mut conn)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if self.read_only {
            let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
            let conn = Connection::open_with_flags(&self.path, flags)
                .map_err(|err| store_error("open sqlite db read-only", err))?;
            conn.pragma_update(None, "busy_timeout", 5000)
                .map_err(|err| store_error("set busy_timeout", err))?;
            return Ok(conn);
        }

        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent).map_err(|err| {
                StoreError::Unavailable(format!("Failed to create store directory: {}", err))
            })?;
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|err| store_error("open sqlite db", err))?;

        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|err| store_error("set busy_timeout", err))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|err| store_error("enable WAL", err))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|err| store_error("set synchronous", err))?;

        Ok(conn)
    }
}

impl SessionStore for SqliteSessionStore {
    fn create_session(
        &self,
        host_ip: &str,
        client_ip: &str,
        start_time: DateTime<Utc>,
    ) -> Result<SessionId, StoreError> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO rdp_sessions (host_ip, client_ip, start_time) VALUES (?1, ?2, ?3)",
                params![host_ip, client_ip, format_timestamp(start_time)],
            )
            .map_err(|err| store_error("insert session", err))?;
            Ok(SessionId(conn.last_insert_rowid()))
        })
    }

    fn close_session(&self, id: SessionId, end_time: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE rdp_sessions SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL",
                    params![format_timestamp(end_time), id.0],
                )
                .map_err(|err| store_error("close session", err))?;
            if updated == 0 {
                return Err(StoreError::NotFound(id));
            }
            Ok(())
        })
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let start_raw: String = row.get(3)?;
    let end_raw: Option<String> = row.get(4)?;
    Ok(SessionRecord {
        id: SessionId(row.get(0)?),
        host_ip: row.get(1)?,
        client_ip: row.get(2)?,
        start_time: parse_timestamp(3, &start_raw)?,
        end_time: end_raw
            .map(|value| parse_timestamp(4, &value))
            .transpose()?,
    })
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn store_error(context: &str, err: rusqlite::Error) -> StoreError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        StoreError::ConstraintViolation(format!("Failed to {}: {}", context, err))
    } else {
        StoreError::Unavailable(format!("Failed to {}: {}", context, err))
    }
}
