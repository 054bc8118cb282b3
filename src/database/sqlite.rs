//! SQLite database wrapper.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

const SCHEMA: &str = "
PRAGMA journal_mode=WAL;
PRAGMA busy_timeout=5000;

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY,
    username      TEXT,
    first_name    TEXT NOT NULL DEFAULT '',
    last_name     TEXT,
    is_banned     INTEGER NOT NULL DEFAULT 0,
    is_admin      INTEGER NOT NULL DEFAULT 0,
    joined_at     INTEGER NOT NULL,
    last_active   INTEGER NOT NULL,
    files_renamed INTEGER NOT NULL DEFAULT 0,
    total_size    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_settings (
    user_id           INTEGER PRIMARY KEY,
    rename_mode       TEXT NOT NULL DEFAULT 'auto',
    media_type        TEXT NOT NULL DEFAULT 'document',
    format_template   TEXT NOT NULL,
    auto_thumbnail    INTEGER NOT NULL DEFAULT 1,
    thumbnail_file_id TEXT,
    metadata_enabled  INTEGER NOT NULL DEFAULT 0,
    metadata          TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS format_templates (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    name       TEXT NOT NULL COLLATE NOCASE,
    template   TEXT NOT NULL,
    variables  TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    UNIQUE (user_id, name)
);
CREATE INDEX IF NOT EXISTS idx_format_templates_user ON format_templates(user_id);

CREATE TABLE IF NOT EXISTS dump_channels (
    channel_id   INTEGER PRIMARY KEY,
    channel_name TEXT NOT NULL,
    added_by     INTEGER NOT NULL,
    added_at     INTEGER NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS file_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL,
    original_name TEXT NOT NULL,
    new_name      TEXT NOT NULL,
    file_size     INTEGER NOT NULL,
    file_type     TEXT NOT NULL,
    processing_ms INTEGER NOT NULL,
    processed_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_file_history_user ON file_history(user_id, processed_at);
CREATE INDEX IF NOT EXISTS idx_file_history_time ON file_history(processed_at);

CREATE TABLE IF NOT EXISTS rate_limits (
    user_id       INTEGER PRIMARY KEY,
    request_count INTEGER NOT NULL,
    window_start  INTEGER NOT NULL
);
";

/// Shared handle to the bot's SQLite database.
///
/// A single connection sits behind a mutex; every call runs on tokio's
/// blocking pool so the async workers never wait on disk I/O.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;
        let db = Self::from_connection(conn)?;

        info!("SQLite database ready at {}", path.display());
        Ok(db)
    }

    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA).context("applying schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .context("database task panicked")?;

        Ok(result?)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_applies_twice() {
        let db = Database::in_memory().unwrap();
        db.call(|conn| conn.execute_batch(SCHEMA)).await.unwrap();

        let tables: i64 = db
            .call(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                     ('users','user_settings','format_templates','dump_channels','file_history','rate_limits')",
                    [],
                    |row| row.get(0),
                )
            })
            .await
            .unwrap();
        assert_eq!(tables, 6);
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }
}
