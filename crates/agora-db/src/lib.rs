pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub const DEFAULT_READER_POOL_SIZE: usize = 4;

/// SQLite handle pool: a single writer plus a fixed set of read-only readers.
///
/// Callers never hold a connection beyond the closure passed to
/// [`Database::with_conn`] / [`Database::with_conn_mut`]; the lock guard is
/// dropped on every exit path of the closure.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path, reader_count: usize) -> Result<Self> {
        if reader_count == 0 {
            bail!("reader pool size must be at least 1");
        }

        let writer = Connection::open(path)?;

        // WAL mode so readers never block on the writer
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(reader_count);
        for _ in 0..reader_count {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            reader_count
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Run `f` against one of the read-only connections.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Run `f` against the writer connection.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| anyhow!("Writer lock poisoned: {}", e))?;
        f(&conn)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub fn open_temp() -> (Database, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db"), 2).unwrap();
        (db, dir)
    }
}
