//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use chatsync_shared::constants::APP_NAME;

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the default history cache.
    ///
    /// The database file is placed in the platform-appropriate cache directory:
    /// - Linux:   `~/.cache/chatsync/history.db`
    /// - macOS:   `~/Library/Caches/com.chatsync.chatsync/history.db`
    /// - Windows: `{FOLDERID_LocalAppData}\chatsync\chatsync\cache\history.db`
    pub fn open_default() -> Result<Self> {
        let project_dirs =
            ProjectDirs::from("com", APP_NAME, APP_NAME).ok_or(StoreError::NoDataDir)?;

        let cache_dir = project_dirs.cache_dir();
        std::fs::create_dir_all(cache_dir)?;

        let db_path = cache_dir.join("history.db");

        tracing::info!(path = %db_path.display(), "opening history cache");

        Self::open_at(&db_path)
    }

    /// Open (or create) a cache at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn)
    }

    /// Open a throwaway cache living only in memory.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        assert!(path.exists());
    }

    #[test]
    fn reopening_skips_applied_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        drop(Database::open_at(&path).unwrap());
        let db = Database::open_at(&path).expect("second open should succeed");
        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
