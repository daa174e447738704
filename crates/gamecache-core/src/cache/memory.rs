//! In-process cache storage.

use super::traits::{CacheStats, CacheStorage, NamespaceMeta};
use crate::error::{GameCacheError, Result};
use crate::models::FetchResponse;
use std::collections::HashMap;
use std::sync::RwLock;

type Namespace = HashMap<String, FetchResponse>;

/// Cache storage held entirely in memory.
///
/// Contents disappear with the process.
#[derive(Default)]
pub struct MemoryCacheStorage {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Namespace>>> {
        self.namespaces
            .read()
            .map_err(|e| GameCacheError::Other(format!("Cache lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Namespace>>> {
        self.namespaces
            .write()
            .map_err(|e| GameCacheError::Other(format!("Cache lock poisoned: {}", e)))
    }
}

impl CacheStorage for MemoryCacheStorage {
    fn open(&self, namespace: &str) -> Result<()> {
        self.write()?.entry(namespace.to_string()).or_default();
        Ok(())
    }

    fn match_entry(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>> {
        Ok(self
            .read()?
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn put(&self, namespace: &str, key: &str, response: &FetchResponse) -> Result<()> {
        self.write()?
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self
            .write()?
            .get_mut(namespace)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .read()?
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.write()?.remove(namespace).is_some())
    }

    fn stats(&self) -> Result<CacheStats> {
        let namespaces = self
            .read()?
            .iter()
            .map(|(name, entries)| NamespaceMeta {
                namespace: name.clone(),
                entry_count: entries.len(),
                total_size_bytes: entries.values().map(FetchResponse::size).sum(),
            })
            .collect();
        Ok(CacheStats::from_namespaces(namespaces))
    }
}
