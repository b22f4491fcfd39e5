//! Key/Value Backend Module
//!
//! Defines the backend seam and a volatile in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{OfflineError, Result};
use crate::storage::DatabaseSchema;

// == Backend Trait ==
/// Persistent key/value engine underneath a [`crate::storage::Database`].
///
/// Implementations only need per-key atomicity. Store names have already
/// been validated against the schema by the time a call reaches the backend.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Opens (creating on first use) every store declared in `schema`.
    ///
    /// Must be idempotent.
    async fn open(&self, schema: &DatabaseSchema) -> Result<()>;

    /// Returns the record stored under `key`, if any.
    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>>;

    /// Inserts or replaces the record stored under `key`.
    async fn put(&self, store: &str, key: &str, item: Value) -> Result<()>;

    /// Deletes the record stored under `key`. Absent keys are not an error.
    async fn delete(&self, store: &str, key: &str) -> Result<()>;

    /// Returns every record of the store, in no particular order.
    async fn get_all(&self, store: &str) -> Result<Vec<Value>>;

    /// Removes every record of the store.
    async fn clear(&self, store: &str) -> Result<()>;
}

// == Memory Backend ==
/// Volatile backend keeping every store in a `HashMap`.
///
/// Survives for as long as the value itself does, so sharing one instance
/// across several `Database::open` calls behaves like reopening a persisted
/// database.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stores: RwLock<HashMap<String, HashMap<String, Value>>>,
    /// Simulates a platform without any persistent storage
    unavailable: bool,
}

impl MemoryBackend {
    // == Constructor ==
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend that refuses to open, as a platform with storage
    /// disabled would.
    pub fn unavailable() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            unavailable: true,
        }
    }
}

fn store_missing(store: &str) -> OfflineError {
    OfflineError::StorageUnavailable(format!("store '{}' has not been opened", store))
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn open(&self, schema: &DatabaseSchema) -> Result<()> {
        if self.unavailable {
            return Err(OfflineError::StorageUnavailable(format!(
                "no persistent storage available for database '{}'",
                schema.name
            )));
        }

        let mut stores = self.stores.write().await;
        for name in &schema.stores {
            stores.entry(name.clone()).or_default();
        }
        Ok(())
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        let stores = self.stores.read().await;
        let records = stores.get(store).ok_or_else(|| store_missing(store))?;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, store: &str, key: &str, item: Value) -> Result<()> {
        let mut stores = self.stores.write().await;
        let records = stores.get_mut(store).ok_or_else(|| store_missing(store))?;
        records.insert(key.to_string(), item);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<()> {
        let mut stores = self.stores.write().await;
        let records = stores.get_mut(store).ok_or_else(|| store_missing(store))?;
        records.remove(key);
        Ok(())
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Value>> {
        let stores = self.stores.read().await;
        let records = stores.get(store).ok_or_else(|| store_missing(store))?;
        Ok(records.values().cloned().collect())
    }

    async fn clear(&self, store: &str) -> Result<()> {
        let mut stores = self.stores.write().await;
        let records = stores.get_mut(store).ok_or_else(|| store_missing(store))?;
        records.clear();
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> DatabaseSchema {
        DatabaseSchema::new("test-db", 1, ["a", "b"])
    }

    #[tokio::test]
    async fn test_memory_open_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();
        backend.put("a", "k", json!({"id": "k"})).await.unwrap();

        // Reopening must not wipe existing records
        backend.open(&schema()).await.unwrap();
        assert!(backend.get("a", "k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_unavailable() {
        let backend = MemoryBackend::unavailable();
        let result = backend.open(&schema()).await;
        assert!(matches!(result, Err(OfflineError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_memory_unopened_store() {
        let backend = MemoryBackend::new();
        let result = backend.get("a", "k").await;
        assert!(matches!(result, Err(OfflineError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_memory_delete_absent_key() {
        let backend = MemoryBackend::new();
        backend.open(&schema()).await.unwrap();
        backend.delete("b", "missing").await.unwrap();
        assert!(backend.get_all("b").await.unwrap().is_empty());
    }
}
