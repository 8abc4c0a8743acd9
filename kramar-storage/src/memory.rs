//! In-memory store, used by tests and simulated sessions.

use crate::collection::Collection;
use crate::error::{StorageError, StorageResult};
use crate::store::PersistentStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::RwLock;

type Collections = HashMap<Collection, BTreeMap<String, Value>>;

/// A [`PersistentStore`] held entirely in memory.
///
/// Every successful write is appended to a log so callers can observe which
/// collections were touched.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Option<Collections>>,
    write_log: Mutex<Vec<(Collection, String)>>,
}

impl MemoryStore {
    /// Creates an uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that is already initialized.
    pub async fn initialized() -> Self {
        let store = Self::new();
        *store.collections.write().await = Some(HashMap::new());
        store
    }

    /// Every `(collection, key)` written so far, in order.
    pub fn write_log(&self) -> Vec<(Collection, String)> {
        self.write_log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Number of writes that targeted `collection`.
    pub fn writes_to(&self, collection: Collection) -> usize {
        self.write_log()
            .iter()
            .filter(|(c, _)| *c == collection)
            .count()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn init(&self) -> StorageResult<()> {
        let mut guard = self.collections.write().await;
        if guard.is_none() {
            *guard = Some(HashMap::new());
        }
        Ok(())
    }

    async fn store(&self, collection: Collection, record: Value) -> StorageResult<()> {
        let key = collection.key_of(&record)?;
        let mut guard = self.collections.write().await;
        let collections = guard.as_mut().ok_or(StorageError::NotInitialized)?;
        collections
            .entry(collection)
            .or_default()
            .insert(key.clone(), record);
        if let Ok(mut log) = self.write_log.lock() {
            log.push((collection, key));
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, key: &str) -> StorageResult<Option<Value>> {
        let guard = self.collections.read().await;
        let collections = guard.as_ref().ok_or(StorageError::NotInitialized)?;
        Ok(collections
            .get(&collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn get_all(&self, collection: Collection) -> StorageResult<Vec<Value>> {
        let guard = self.collections.read().await;
        let collections = guard.as_ref().ok_or(StorageError::NotInitialized)?;
        Ok(collections
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, collection: Collection, key: &str) -> StorageResult<()> {
        let mut guard = self.collections.write().await;
        let collections = guard.as_mut().ok_or(StorageError::NotInitialized)?;
        if let Some(records) = collections.get_mut(&collection) {
            records.remove(key);
        }
        Ok(())
    }
}
