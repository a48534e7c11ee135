use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension, Row};

use crate::domain::{Draft, Storage, StoredResource};
use crate::error::StoreError;

const CACHE_SIZE: &str = "4096";
const COLUMNS: &str = "id, name, content, content_type, blake3_hash, created_at, updated_at";

pub enum Mode {
    ReadWrite,
    ReadOnly,
}

/// Handle to the SQLite database file. Connections are opened per operation,
/// so the handle is cheap to share between request workers.
#[derive(Debug, Clone)]
pub struct Sqlite {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Sqlite {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }

    /// Lets SQLite refresh its planner statistics. Called once on shutdown.
    pub fn close(&self) -> Result<(), StoreError> {
        let conn = self.connect(Mode::ReadWrite)?;
        conn.execute_batch("PRAGMA optimize;").map_err(|e| classify(e, ""))?;
        conn.close().map_err(|(_, e)| classify(e, ""))
    }

    fn connect(&self, mode: Mode) -> Result<Connection, StoreError> {
        let flags = match mode {
            Mode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            Mode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(|e| classify(e, ""))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| classify(e, ""))?;
        pragma_update(&conn, "cache_size", CACHE_SIZE)?;
        Ok(conn)
    }
}

impl Storage for Sqlite {
    fn new_database(&self) -> Result<(), StoreError> {
        let conn = self.connect(Mode::ReadWrite)?;
        pragma_update(&conn, "encoding", "UTF-8")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS resources (
                  id            INTEGER PRIMARY KEY AUTOINCREMENT,
                  name          TEXT NOT NULL UNIQUE,
                  content       BLOB NOT NULL,
                  content_type  TEXT NOT NULL,
                  blake3_hash   TEXT NOT NULL,
                  created_at    TEXT NOT NULL,
                  updated_at    TEXT NOT NULL
                  )",
            [],
        )
        .map_err(|e| classify(e, ""))?;

        Ok(())
    }

    fn insert(&self, draft: &Draft<'_>) -> Result<StoredResource, StoreError> {
        let mut conn = self.connect(Mode::ReadWrite)?;
        pragma_update(&conn, "synchronous", "FULL")?;
        let run = |conn: &mut Connection| -> rusqlite::Result<StoredResource> {
            let tx = conn.transaction()?;
            tx.prepare_cached(
                "INSERT INTO resources (name, content, content_type, blake3_hash, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            )?
            .execute(params![
                draft.name,
                draft.content,
                draft.content_type,
                draft.hash(),
                draft.at
            ])?;
            let id = tx.last_insert_rowid();
            let resource = tx.query_row(
                &format!("SELECT {COLUMNS} FROM resources WHERE id = ?1"),
                params![id],
                from_row,
            )?;
            tx.commit()?;
            Ok(resource)
        };
        run(&mut conn).map_err(|e| classify(e, draft.name))
    }

    fn get(&self, name: &str) -> Result<StoredResource, StoreError> {
        let conn = self.connect(Mode::ReadOnly)?;
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM resources WHERE name = ?1"),
            params![name],
            from_row,
        )
        .map_err(|e| classify(e, name))
    }

    fn contains(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.connect(Mode::ReadOnly)?;
        conn.query_row(
            "SELECT 1 FROM resources WHERE name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| classify(e, name))
    }

    fn update(&self, draft: &Draft<'_>) -> Result<StoredResource, StoreError> {
        let mut conn = self.connect(Mode::ReadWrite)?;
        pragma_update(&conn, "synchronous", "FULL")?;
        let run = |conn: &mut Connection| -> rusqlite::Result<StoredResource> {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE resources
                     SET content = ?1, content_type = ?2, blake3_hash = ?3, updated_at = ?4
                     WHERE name = ?5",
                params![
                    draft.content,
                    draft.content_type,
                    draft.hash(),
                    draft.at,
                    draft.name
                ],
            )?;
            if changed == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            let resource = tx.query_row(
                &format!("SELECT {COLUMNS} FROM resources WHERE name = ?1"),
                params![draft.name],
                from_row,
            )?;
            tx.commit()?;
            Ok(resource)
        };
        run(&mut conn).map_err(|e| classify(e, draft.name))
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let conn = self.connect(Mode::ReadWrite)?;
        let deleted = conn
            .execute("DELETE FROM resources WHERE name = ?1", params![name])
            .map_err(|e| classify(e, name))?;
        if deleted == 0 {
            Err(StoreError::NotFound(name.to_owned()))
        } else {
            Ok(())
        }
    }

    fn list(&self) -> Result<Vec<StoredResource>, StoreError> {
        let conn = self.connect(Mode::ReadOnly)?;
        let run = || -> rusqlite::Result<Vec<StoredResource>> {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM resources ORDER BY name"))?;
            let rows = stmt.query_map([], from_row)?;
            rows.collect::<Result<Vec<_>, _>>()
        };
        run().map_err(|e| classify(e, ""))
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<StoredResource> {
    Ok(StoredResource {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        content_type: row.get(3)?,
        blake3_hash: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn pragma_update(conn: &Connection, name: &str, value: &str) -> Result<(), StoreError> {
    conn.pragma_update(None, name, value)
        .map_err(|e| classify(e, ""))
}

/// Maps a driver error onto the store's error kinds. `name` identifies the
/// row the statement was about.
fn classify(e: rusqlite::Error, name: &str) -> StoreError {
    match &e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(name.to_owned()),
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => StoreError::Conflict(name.to_owned()),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Internal(e.to_string()),
        },
        _ => StoreError::Internal(e.to_string()),
    }
}
