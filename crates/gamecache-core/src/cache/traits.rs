//! Cache storage trait and types.

use crate::error::Result;
use crate::models::FetchResponse;
use serde::{Deserialize, Serialize};

/// Metadata about a cache namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceMeta {
    /// Namespace name.
    pub namespace: String,
    /// Number of entries in this namespace.
    pub entry_count: usize,
    /// Total size of all entry bodies in bytes.
    pub total_size_bytes: u64,
}

/// Cache statistics across all namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub namespace_count: usize,
    pub namespaces: Vec<NamespaceMeta>,
}

impl CacheStats {
    /// Build totals from per-namespace metadata.
    pub fn from_namespaces(mut namespaces: Vec<NamespaceMeta>) -> Self {
        namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        Self {
            total_entries: namespaces.iter().map(|m| m.entry_count).sum(),
            total_size_bytes: namespaces.iter().map(|m| m.total_size_bytes).sum(),
            namespace_count: namespaces.len(),
            namespaces,
        }
    }
}

/// Namespace-isolated response storage.
///
/// Each call is atomic with respect to other calls on the same backend.
/// All operations are synchronous to match rusqlite's API.
pub trait CacheStorage: Send + Sync {
    /// Create the namespace if it does not exist.
    fn open(&self, namespace: &str) -> Result<()>;

    /// Get the entry stored under `key`.
    ///
    /// Returns `None` when the namespace or the key doesn't exist.
    fn match_entry(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>>;

    /// Store a response, creating the namespace if needed.
    ///
    /// Overwrites any existing entry with the same key.
    fn put(&self, namespace: &str, key: &str, response: &FetchResponse) -> Result<()>;

    /// Delete a single entry.
    fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// List keys in a namespace.
    fn keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// List namespace names.
    fn namespaces(&self) -> Result<Vec<String>>;

    /// True when the namespace exists.
    fn has_namespace(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces()?.iter().any(|n| n == namespace))
    }

    /// Delete a namespace and all of its entries.
    fn delete_namespace(&self, namespace: &str) -> Result<bool>;

    /// Overall cache statistics.
    fn stats(&self) -> Result<CacheStats>;
}
