//! SQLite-backed store.
//!
//! All collections share one table keyed by `(collection, key)`; records are
//! kept as JSON text. Queries run on the blocking pool so the async callers
//! never stall the runtime.

use crate::collection::Collection;
use crate::error::{StorageError, StorageResult};
use crate::store::PersistentStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Persistent store backed by a SQLite file.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    initialized: AtomicBool,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path. Call `init()` before use.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!("Opened store at {}", path.as_ref().display());
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            initialized: AtomicBool::new(false),
        }
    }

    fn ensure_initialized(&self) -> StorageResult<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StorageError::Task(format!("connection lock poisoned: {e}")))?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PersistentStore for SqliteStore {
    async fn init(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS records (
                    collection TEXT NOT NULL,
                    key TEXT NOT NULL,
                    data TEXT NOT NULL,
                    PRIMARY KEY (collection, key)
                );
                ",
            )?;
            Ok(())
        })
        .await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn store(&self, collection: Collection, record: Value) -> StorageResult<()> {
        self.ensure_initialized()?;
        let key = collection.key_of(&record)?;
        let data = serde_json::to_string(&record)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records (collection, key, data) VALUES (?1, ?2, ?3)",
                params![collection.as_str(), key, data],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, collection: Collection, key: &str) -> StorageResult<Option<Value>> {
        self.ensure_initialized()?;
        let key = key.to_string();
        let data: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT data FROM records WHERE collection = ?1 AND key = ?2",
                        params![collection.as_str(), key],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        data.map(|d| serde_json::from_str(&d).map_err(Into::into))
            .transpose()
    }

    async fn get_all(&self, collection: Collection) -> StorageResult<Vec<Value>> {
        self.ensure_initialized()?;
        let rows: Vec<String> = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT data FROM records WHERE collection = ?1 ORDER BY key")?;
                let rows = stmt
                    .query_map(params![collection.as_str()], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.iter()
            .map(|d| serde_json::from_str(d).map_err(Into::into))
            .collect()
    }

    async fn delete(&self, collection: Collection, key: &str) -> StorageResult<()> {
        self.ensure_initialized()?;
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM records WHERE collection = ?1 AND key = ?2",
                params![collection.as_str(), key],
            )?;
            Ok(())
        })
        .await
    }
}
