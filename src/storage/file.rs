//! File Backend Module
//!
//! Persists every store as a JSON document under `<dir>/<database>/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{OfflineError, Result};
use crate::storage::{DatabaseSchema, KvBackend};

const META_FILE: &str = "_meta.json";

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseMeta {
    name: String,
    version: u32,
}

#[derive(Debug, Default)]
struct FileState {
    /// Directory of the opened database, None until `open` succeeds
    root: Option<PathBuf>,
    stores: HashMap<String, HashMap<String, Value>>,
}

// == File Backend ==
/// Backend writing through to one JSON file per store.
///
/// Every mutation rewrites the affected store through a temporary file and a
/// rename, so a crash leaves either the old or the new document on disk. The
/// in-memory copy only changes once the new document is on disk.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    state: Mutex<FileState>,
}

impl FileBackend {
    // == Constructor ==
    /// Creates a backend rooted at `dir`. Nothing touches the disk until
    /// [`KvBackend::open`] is called.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Mutex::new(FileState::default()),
        }
    }

    async fn persist(root: &Path, store: &str, records: &HashMap<String, Value>) -> Result<()> {
        let path = root.join(format!("{}.json", store));
        let tmp = root.join(format!("{}.json.tmp", store));
        let bytes = serde_json::to_vec(records)?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| {
                OfflineError::StorageUnavailable(format!("write {}: {}", tmp.display(), e))
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| {
                OfflineError::StorageUnavailable(format!("rename {}: {}", path.display(), e))
            })?;

        debug!("Persisted store '{}' ({} records)", store, records.len());
        Ok(())
    }

    async fn load_store(root: &Path, store: &str) -> Result<HashMap<String, Value>> {
        let path = root.join(format!("{}.json", store));
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(OfflineError::StorageUnavailable(format!(
                "read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn check_version(root: &Path, schema: &DatabaseSchema) -> Result<()> {
        let path = root.join(META_FILE);
        if let Ok(bytes) = tokio::fs::read(&path).await {
            let meta: DatabaseMeta = serde_json::from_slice(&bytes)?;
            if meta.version > schema.version {
                return Err(OfflineError::StorageUnavailable(format!(
                    "database '{}' is at version {}, newer than requested {}",
                    schema.name, meta.version, schema.version
                )));
            }
        }

        let meta = DatabaseMeta {
            name: schema.name.clone(),
            version: schema.version,
        };
        tokio::fs::write(&path, serde_json::to_vec(&meta)?)
            .await
            .map_err(|e| {
                OfflineError::StorageUnavailable(format!("write {}: {}", path.display(), e))
            })
    }
}

fn not_opened() -> OfflineError {
    OfflineError::StorageUnavailable("database has not been opened".to_string())
}

#[async_trait]
impl KvBackend for FileBackend {
    async fn open(&self, schema: &DatabaseSchema) -> Result<()> {
        let root = self.dir.join(&schema.name);
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            OfflineError::StorageUnavailable(format!("cannot create {}: {}", root.display(), e))
        })?;
        Self::check_version(&root, schema).await?;

        let mut state = self.state.lock().await;
        for store in &schema.stores {
            if !state.stores.contains_key(store) {
                let records = Self::load_store(&root, store).await?;
                state.stores.insert(store.clone(), records);
            }
        }
        state.root = Some(root.clone());

        info!(
            "Opened database '{}' v{} at {}",
            schema.name,
            schema.version,
            root.display()
        );
        Ok(())
    }

    async fn get(&self, store: &str, key: &str) -> Result<Option<Value>> {
        let state = self.state.lock().await;
        let records = state.stores.get(store).ok_or_else(not_opened)?;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, store: &str, key: &str, item: Value) -> Result<()> {
        let mut state = self.state.lock().await;
        let root = state.root.clone().ok_or_else(not_opened)?;
        let mut records = state.stores.get(store).ok_or_else(not_opened)?.clone();
        records.insert(key.to_string(), item);
        Self::persist(&root, store, &records).await?;
        state.stores.insert(store.to_string(), records);
        Ok(())
    }

    async fn delete(&self, store: &str, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let root = state.root.clone().ok_or_else(not_opened)?;
        let records = state.stores.get(store).ok_or_else(not_opened)?;
        if !records.contains_key(key) {
            return Ok(());
        }

        let mut records = records.clone();
        records.remove(key);
        Self::persist(&root, store, &records).await?;
        state.stores.insert(store.to_string(), records);
        Ok(())
    }

    async fn get_all(&self, store: &str) -> Result<Vec<Value>> {
        let state = self.state.lock().await;
        let records = state.stores.get(store).ok_or_else(not_opened)?;
        Ok(records.values().cloned().collect())
    }

    async fn clear(&self, store: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let root = state.root.clone().ok_or_else(not_opened)?;
        if state.stores.get(store).ok_or_else(not_opened)?.is_empty() {
            return Ok(());
        }

        let records = HashMap::new();
        Self::persist(&root, store, &records).await?;
        state.stores.insert(store.to_string(), records);
        Ok(())
    }
}
