//! Database Module
//!
//! Schema-checked handle over a key/value backend.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{OfflineError, Result};
use crate::storage::{
    KvBackend, CACHE_ENTRIES_STORE, DB_NAME, DB_VERSION, EVENT_LOG_STORE, ID_FIELD, QUEUE_STORE,
};

// == Database Schema ==
/// Name, version and the fixed set of stores of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub name: String,
    pub version: u32,
    pub stores: Vec<String>,
}

impl DatabaseSchema {
    /// Creates a schema declaring `stores` up front.
    pub fn new<I, S>(name: impl Into<String>, version: u32, stores: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            version,
            stores: stores.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `store` is declared by this schema.
    pub fn has_store(&self, store: &str) -> bool {
        self.stores.iter().any(|s| s == store)
    }
}

impl Default for DatabaseSchema {
    /// The application's offline database.
    fn default() -> Self {
        Self::new(
            DB_NAME,
            DB_VERSION,
            [QUEUE_STORE, EVENT_LOG_STORE, CACHE_ENTRIES_STORE],
        )
    }
}

// == Database ==
/// Handle to an opened database.
///
/// Cheap to clone; every clone shares the same backend. Records are JSON
/// objects carrying a string `id` field, which is also their key.
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn KvBackend>,
    schema: Arc<DatabaseSchema>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl Database {
    // == Open ==
    /// Opens the database, creating its stores on first use.
    ///
    /// Safe to call repeatedly against the same backend.
    ///
    /// # Errors
    /// `StorageUnavailable` if the backend cannot be opened.
    pub async fn open(backend: Arc<dyn KvBackend>, schema: DatabaseSchema) -> Result<Self> {
        backend.open(&schema).await?;
        Ok(Self {
            backend,
            schema: Arc::new(schema),
        })
    }

    /// Returns the schema this handle was opened with.
    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    fn check_store(&self, store: &str) -> Result<()> {
        if self.schema.has_store(store) {
            Ok(())
        } else {
            Err(OfflineError::UnknownStore(store.to_string()))
        }
    }

    // == Get ==
    /// Returns the record stored under `key`, or None if absent.
    pub async fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        self.check_store(store)?;
        self.backend.get(store, key).await
    }

    /// Typed variant of [`Database::get`].
    pub async fn get_as<T: DeserializeOwned>(&self, store: &str, key: &str) -> Result<Option<T>> {
        match self.get(store, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    // == Put ==
    /// Upserts `item` under its own `id` field.
    ///
    /// # Errors
    /// `InvalidRequest` if the item is not an object with a string `id`.
    pub async fn put(&self, store: &str, item: Value) -> Result<()> {
        self.check_store(store)?;
        let key = item
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OfflineError::InvalidRequest(format!(
                    "record for store '{}' has no string '{}' field",
                    store, ID_FIELD
                ))
            })?
            .to_string();
        self.backend.put(store, &key, item).await
    }

    /// Typed variant of [`Database::put`].
    pub async fn put_as<T: Serialize>(&self, store: &str, item: &T) -> Result<()> {
        self.put(store, serde_json::to_value(item)?).await
    }

    // == Remove ==
    /// Deletes the record stored under `key`; a missing key is a no-op.
    pub async fn remove(&self, store: &str, key: &str) -> Result<()> {
        self.check_store(store)?;
        self.backend.delete(store, key).await
    }

    // == Get All ==
    /// Returns every record of the store, in no particular order.
    pub async fn get_all(&self, store: &str) -> Result<Vec<Value>> {
        self.check_store(store)?;
        self.backend.get_all(store).await
    }

    /// Typed variant of [`Database::get_all`].
    pub async fn get_all_as<T: DeserializeOwned>(&self, store: &str) -> Result<Vec<T>> {
        self.get_all(store)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(OfflineError::from))
            .collect()
    }

    // == Clear ==
    /// Removes every record of the store.
    pub async fn clear(&self, store: &str) -> Result<()> {
        self.check_store(store)?;
        self.backend.clear(store).await
    }
}
