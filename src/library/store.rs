//! SQLite-backed persistence for the local library.
//!
//! Holds the state that outlives a session:
//! - Favorite image paths
//! - Monitored directories shown as library roots

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

const DB_FILE: &str = "library.sqlite";

/// Favorites and monitored directories.
///
/// The database lives at `<data dir>/library.sqlite` and uses WAL mode.
pub struct LibraryStore {
    conn: Connection,
}

impl LibraryStore {
    /// Opens or creates the database inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        Self::open(&data_dir.join(DB_FILE))
    }

    /// Opens or creates the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )
        .context("Failed to configure SQLite pragmas")?;

        let store = Self { conn };
        store.create_tables()?;

        info!("Opened library store at {:?}", path);
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS favorites (
                path TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS monitored_dirs (
                path TEXT PRIMARY KEY NOT NULL,
                added_at INTEGER NOT NULL
            );
            ",
            )
            .context("Failed to create database tables")?;

        debug!("Database tables created/verified");
        Ok(())
    }

    // =========================================================================
    // Favorites
    // =========================================================================

    /// Returns true if the path is marked as favorite.
    pub fn is_favorite(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy();
        let exists: Option<i32> = self
            .conn
            .query_row(
                "SELECT 1 FROM favorites WHERE path = ?1",
                params![path_str.as_ref()],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query favorite status")?;
        Ok(exists.is_some())
    }

    /// Toggles favorite status for the given path.
    /// Returns true if the item is now favorited.
    pub fn toggle_favorite(&self, path: &Path) -> Result<bool> {
        let path_str = path.to_string_lossy();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO favorites (path, created_at) VALUES (?1, ?2)",
            params![path_str.as_ref(), Self::now()],
        )?;
        if inserted > 0 {
            return Ok(true);
        }
        self.conn.execute(
            "DELETE FROM favorites WHERE path = ?1",
            params![path_str.as_ref()],
        )?;
        Ok(false)
    }

    /// Drops the favorite flag of a deleted image. Returns true if one was set.
    pub fn remove_favorite(&self, path: &Path) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM favorites WHERE path = ?1",
            params![path.to_string_lossy().as_ref()],
        )?;
        Ok(removed > 0)
    }

    // =========================================================================
    // Monitored directories
    // =========================================================================

    /// Adds a monitored directory. Returns false if it was already present.
    pub fn add_directory(&self, path: &Path) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO monitored_dirs (path, added_at) VALUES (?1, ?2)",
            params![path.to_string_lossy().as_ref(), Self::now()],
        )?;
        if inserted > 0 {
            info!("Monitoring directory {:?}", path);
        }
        Ok(inserted > 0)
    }

    /// Removes a monitored directory. Returns false if it was not present.
    pub fn remove_directory(&self, path: &Path) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM monitored_dirs WHERE path = ?1",
            params![path.to_string_lossy().as_ref()],
        )?;
        if removed == 0 {
            warn!("Directory {:?} was not monitored", path);
        }
        Ok(removed > 0)
    }

    /// Returns monitored directories ordered by path.
    pub fn list_directories(&self) -> Result<Vec<PathBuf>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path FROM monitored_dirs ORDER BY path")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut dirs = Vec::new();
        for row in rows {
            dirs.push(PathBuf::from(row?));
        }
        Ok(dirs)
    }

    /// Returns the current Unix timestamp.
    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
