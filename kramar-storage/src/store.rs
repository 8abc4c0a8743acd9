//! The persistent store interface.
//!
//! Records are JSON documents grouped in named collections and upserted by
//! each collection's declared key field. [`StoreExt`] layers typed helpers on
//! top so callers work with their own record types.

use crate::collection::Collection;
use crate::error::StorageResult;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// A keyed document store partitioned into named collections.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Prepares the store. Safe to call more than once.
    async fn init(&self) -> StorageResult<()>;

    /// Inserts or replaces `record`, keyed by the collection's key field.
    async fn store(&self, collection: Collection, record: Value) -> StorageResult<()>;

    /// Fetches one record by key.
    async fn get(&self, collection: Collection, key: &str) -> StorageResult<Option<Value>>;

    /// Fetches every record of a collection, ordered by key.
    async fn get_all(&self, collection: Collection) -> StorageResult<Vec<Value>>;

    /// Removes a record. Removing a missing key is not an error.
    async fn delete(&self, collection: Collection, key: &str) -> StorageResult<()>;
}

/// Typed convenience methods for any [`PersistentStore`].
#[async_trait]
pub trait StoreExt: PersistentStore {
    /// Serializes and stores a record.
    async fn store_record<T>(&self, collection: Collection, record: &T) -> StorageResult<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(record)?;
        self.store(collection, value).await
    }

    /// Fetches and deserializes one record.
    async fn get_record<T>(&self, collection: Collection, key: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(collection, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Fetches and deserializes every record of a collection.
    async fn get_all_records<T>(&self, collection: Collection) -> StorageResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.get_all(collection)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Into::into))
            .collect()
    }
}

impl<S: PersistentStore + ?Sized> StoreExt for S {}
