//! Connection handling for the local document store.
//!
//! [`Database`] owns the `rusqlite::Connection` behind
//! [`crate::store::sqlite::SqliteDocumentStore`] and the bookmark manager.
//! Opening it brings the schema up to date, and [`next_revision`] hands out
//! the version tokens every document write records.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// How long a write waits on another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The local store's SQLite connection, migrated on open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the store file at `path`.
    ///
    /// The CLI and the RPC server may hold the same file, so writers wait up
    /// to [`BUSY_TIMEOUT`] for the lock instead of failing at once.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::migrated(conn)
    }

    /// Opens a private in-memory store, used by tests and dry experiments.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::migrated(Connection::open_in_memory()?)
    }

    fn migrated(conn: Connection) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Claims the next document revision.
///
/// Revisions come from one counter for the whole database, so they increase
/// across all documents and a deleted id that is written again gets a token
/// it never had before. Call it inside the transaction that performs the write.
pub fn next_revision(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row(
        "UPDATE revision_counter SET value = value + 1 WHERE id = 1 RETURNING value",
        [],
        |row| row.get(0),
    )
}
