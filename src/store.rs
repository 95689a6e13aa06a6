//! Persistence of the one setting that outlives a session: the [`Mode`].
//!
//! Reading never fails from the caller's point of view: a missing row, an
//! out-of-range value or a broken database all come back as the default
//! mode, with the cause logged.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::db::Database;
use crate::mode::Mode;

/// Key of the mode row in the `settings` table.
pub const MODE_KEY: &str = "mode";

/// Storage failure.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("settings database error: {message}")]
    Database { busy: bool, message: String },
}

impl StoreError {
    /// True when `SQLite` reported the database busy or locked.
    #[must_use]
    pub fn is_busy_or_locked(&self) -> bool {
        matches!(self, Self::Database { busy: true, .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let busy = match &err {
            sqlx::Error::Database(db) => {
                matches!(db.code().as_deref(), Some("5" | "6" | "SQLITE_BUSY" | "SQLITE_LOCKED"))
                    || db.message().to_ascii_lowercase().contains("database is locked")
            }
            _ => false,
        };
        Self::Database {
            busy,
            message: err.to_string(),
        }
    }
}

/// Key-value storage of the persisted mode.
#[async_trait]
pub trait ModeStore: Send + Sync {
    /// Raw stored integer, `None` when never written.
    async fn load_raw(&self) -> Result<Option<i64>, StoreError>;

    async fn save(&self, mode: Mode) -> Result<(), StoreError>;

    /// Stored mode; read failures and invalid values yield the default.
    async fn load(&self) -> Mode {
        match self.load_raw().await {
            Ok(value) => {
                let mode = Mode::from_stored(value);
                debug!(stored = ?value, %mode, "loaded mode");
                mode
            }
            Err(error) => {
                warn!(error = %error, "could not read stored mode; using default");
                Mode::default()
            }
        }
    }
}

/// `SQLite`-backed store.
#[derive(Debug, Clone)]
pub struct SqliteModeStore {
    db: Database,
}

impl SqliteModeStore {
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ModeStore for SqliteModeStore {
    #[instrument(level = "debug", skip(self))]
    async fn load_raw(&self) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(r"SELECT value FROM settings WHERE key = ?")
            .bind(MODE_KEY)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.map(|(value,)| value))
    }

    #[instrument(level = "debug", skip(self), fields(mode = %mode))]
    async fn save(&self, mode: Mode) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO settings (key, value, updated_at)
              VALUES (?, ?, datetime('now'))
              ON CONFLICT(key) DO UPDATE
              SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(MODE_KEY)
        .bind(mode.as_stored())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }
}

/// Process-local store for one-shot runs and tests.
#[derive(Debug, Default)]
pub struct MemoryModeStore {
    value: Mutex<Option<i64>>,
}

impl MemoryModeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a raw value, valid or not.
    #[must_use]
    pub fn with_raw(value: i64) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }
}

#[async_trait]
impl ModeStore for MemoryModeStore {
    async fn load_raw(&self) -> Result<Option<i64>, StoreError> {
        Ok(*self.value.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn save(&self, mode: Mode) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(mode.as_stored());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn disk_error() -> StoreError {
        StoreError::Database {
            busy: false,
            message: "disk I/O error".to_string(),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ModeStore for BrokenStore {
        async fn load_raw(&self) -> Result<Option<i64>, StoreError> {
            Err(disk_error())
        }

        async fn save(&self, _mode: Mode) -> Result<(), StoreError> {
            Err(disk_error())
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_defaults_to_auto_when_empty() {
        let store = SqliteModeStore::new(Database::new_in_memory().await.unwrap());
        assert_eq!(store.load_raw().await.unwrap(), None);
        assert_eq!(store.load().await, Mode::Auto);
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trips_every_mode() {
        let store = SqliteModeStore::new(Database::new_in_memory().await.unwrap());
        for mode in Mode::ALL {
            store.save(mode).await.unwrap();
            assert_eq!(store.load().await, mode);
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_invalid_value_loads_as_auto() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query("INSERT INTO settings (key, value) VALUES ('mode', 9)")
            .execute(db.pool())
            .await
            .unwrap();
        let store = SqliteModeStore::new(db);

        assert_eq!(store.load_raw().await.unwrap(), Some(9));
        assert_eq!(store.load().await, Mode::Auto);
    }

    #[tokio::test]
    async fn test_sqlite_store_closed_pool_reports_error_and_loads_auto() {
        let db = Database::new_in_memory().await.unwrap();
        let store = SqliteModeStore::new(db.clone());
        store.save(Mode::Disabled).await.unwrap();
        db.close().await;

        assert!(store.load_raw().await.is_err());
        assert_eq!(store.load().await, Mode::Auto);
    }

    #[tokio::test]
    async fn test_read_failure_loads_auto() {
        assert_eq!(BrokenStore.load().await, Mode::Auto);
    }

    #[tokio::test]
    async fn test_memory_store_keeps_last_saved_mode() {
        let store = MemoryModeStore::new();
        store.save(Mode::Manual).await.unwrap();
        assert_eq!(store.load().await, Mode::Manual);
        assert_eq!(MemoryModeStore::with_raw(-1).load().await, Mode::Auto);
    }

    #[test]
    fn test_store_error_busy_flag() {
        let error = StoreError::Database {
            busy: true,
            message: "database is locked".to_string(),
        };
        assert!(error.is_busy_or_locked());
        assert!(!disk_error().is_busy_or_locked());
    }
}
