use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_error, DatabaseError};

/// Key-value table for saved state. Keys are dotted:
/// `position.tag.<id>` and `position.last_tag`.
const CREATE_PREFERENCES: &str = "CREATE TABLE IF NOT EXISTS user_preferences (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the state database and bring its schema up
    /// to date. `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// `DatabaseError::InstanceLocked` when SQLite reports the file busy,
    /// locked or unopenable; `Migration` or `Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        if !in_memory {
            restrict_file(std::path::Path::new(path));
        }

        // Wait up to 5s on a locked file before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}?mode=rwc"))
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            // Each in-memory connection would be its own database
            .max_connections(if in_memory { 1 } else { 2 })
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        let db = Self { pool };
        db.migrate().await.map_err(|e| match e.downcast_ref::<sqlx::Error>() {
            Some(err) if is_lock_error(err) => DatabaseError::InstanceLocked,
            _ => DatabaseError::Migration(e.to_string()),
        })?;
        Ok(db)
    }

    /// Close the pool, waiting for connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create missing tables in one transaction. Safe to repeat.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(CREATE_PREFERENCES).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Make the state file readable by the owner only, creating it 0600 when
/// missing. Failures are logged; SQLite reports anything fatal on connect.
#[cfg(unix)]
fn restrict_file(path: &std::path::Path) {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let result = if path.exists() {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    } else {
        std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
            .map(drop)
    };
    if let Err(e) = result {
        tracing::warn!(path = %path.display(), error = %e, "Could not restrict state file permissions");
    }
}

#[cfg(not(unix))]
fn restrict_file(_path: &std::path::Path) {}
