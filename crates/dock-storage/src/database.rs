//! History database handle
//!
//! A single connection shared behind a mutex. Every connection runs with
//! foreign keys on and a busy timeout; file databases also use WAL.

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::migrations::run_migrations;
use crate::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create the history database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        configure(&conn)?;

        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(
                path = %path.display(),
                journal_mode = %journal_mode,
                "WAL unavailable for history database"
            );
        }

        run_migrations(&conn)?;
        tracing::debug!(path = %path.display(), "Opened history database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Backing file; `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` in a transaction, rolled back if `f` fails
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            path: self.path.clone(),
        }
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;

    fn pragma(db: &Database, name: &str) -> i64 {
        db.with_connection(|conn| Ok(conn.pragma_query_value(None, name, |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
        db.with_connection(|conn| {
            let count: i32 =
                conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
            assert_eq!(count, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_connection_pragmas() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("dock.db")).unwrap();

        assert_eq!(pragma(&db, "foreign_keys"), 1);
        assert_eq!(pragma(&db, "busy_timeout"), 5000);

        let journal_mode: String = db
            .with_connection(|conn| {
                Ok(conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_open_file_twice_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dock.db");

        Database::open(&path).unwrap();
        let db = Database::open(&path).unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        let version: i32 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO history (app_id, url, visited_at) VALUES ('mail', 'https://m.test', 'now')",
                [],
            )?;
            Err(StorageError::Migration("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i32 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
