//! Cache Storage Module
//!
//! The named-cache seam (the platform's Cache API) and an in-memory
//! implementation.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::Response;
use crate::error::Result;

// == Cache Storage Trait ==
/// A set of named caches mapping string keys to responses.
///
/// Operations on a cache that does not exist behave as on an empty cache,
/// except `put`, which creates it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Creates the named cache if it does not exist yet.
    async fn open(&self, name: &str) -> Result<()>;

    /// Returns the names of every existing cache.
    async fn cache_names(&self) -> Result<Vec<String>>;

    /// Deletes a whole cache. Returns false if it did not exist.
    async fn delete_cache(&self, name: &str) -> Result<bool>;

    /// Returns the keys of a cache in insertion order.
    async fn keys(&self, name: &str) -> Result<Vec<String>>;

    async fn match_key(&self, name: &str, key: &str) -> Result<Option<Response>>;

    /// Stores a response, replacing any previous one under the same key.
    async fn put(&self, name: &str, key: &str, response: Response) -> Result<()>;

    /// Removes one entry. Returns false if it was already absent.
    async fn delete(&self, name: &str, key: &str) -> Result<bool>;
}

// == Named Cache ==
#[derive(Debug, Default)]
struct NamedCache {
    entries: HashMap<String, Response>,
    /// Keys in insertion order; a replaced key moves to the back
    order: VecDeque<String>,
}

impl NamedCache {
    fn insert(&mut self, key: &str, response: Response) {
        if self.entries.insert(key.to_string(), response).is_some() {
            self.order.retain(|k| k != key);
        }
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

// == Memory Cache Storage ==
/// Cache storage held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, NamedCache>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a cache (0 if it does not exist).
    pub async fn len(&self, name: &str) -> usize {
        self.caches
            .read()
            .await
            .get(name)
            .map_or(0, |cache| cache.entries.len())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default();
        Ok(())
    }

    async fn cache_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_cache(&self, name: &str) -> Result<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .get(name)
            .map(|cache| cache.order.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn match_key(&self, name: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .caches
            .read()
            .await
            .get(name)
            .and_then(|cache| cache.entries.get(key).cloned()))
    }

    async fn put(&self, name: &str, key: &str, response: Response) -> Result<()> {
        self.caches
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .insert(key, response);
        Ok(())
    }

    async fn delete(&self, name: &str, key: &str) -> Result<bool> {
        Ok(self
            .caches
            .write()
            .await
            .get_mut(name)
            .is_some_and(|cache| cache.remove(key)))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_cache() {
        let storage = MemoryCacheStorage::new();
        storage.put("runtime-v1", "GET /a", Response::new(200, "a")).await.unwrap();

        assert_eq!(storage.cache_names().await.unwrap(), vec!["runtime-v1"]);
        assert_eq!(storage.len("runtime-v1").await, 1);
    }

    #[tokio::test]
    async fn test_keys_in_insertion_order() {
        let storage = MemoryCacheStorage::new();
        for key in ["c", "a", "b"] {
            storage.put("x", key, Response::new(200, key)).await.unwrap();
        }
        assert_eq!(storage.keys("x").await.unwrap(), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_replace_moves_key_to_back() {
        let storage = MemoryCacheStorage::new();
        storage.put("x", "a", Response::new(200, "1")).await.unwrap();
        storage.put("x", "b", Response::new(200, "2")).await.unwrap();
        storage.put("x", "a", Response::new(200, "3")).await.unwrap();

        assert_eq!(storage.keys("x").await.unwrap(), vec!["b", "a"]);
        let a = storage.match_key("x", "a").await.unwrap().unwrap();
        assert_eq!(a.body, "3");
    }

    #[tokio::test]
    async fn test_delete_absent_entry() {
        let storage = MemoryCacheStorage::new();
        assert!(!storage.delete("missing-cache", "k").await.unwrap());

        storage.put("x", "k", Response::new(200, "")).await.unwrap();
        assert!(storage.delete("x", "k").await.unwrap());
        assert!(!storage.delete("x", "k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let storage = MemoryCacheStorage::new();
        storage.open("old").await.unwrap();
        assert!(storage.delete_cache("old").await.unwrap());
        assert!(!storage.delete_cache("old").await.unwrap());
        assert!(storage.keys("old").await.unwrap().is_empty());
    }
}
