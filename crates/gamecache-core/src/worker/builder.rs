//! Builder for configuring an OfflineWorker.

use super::OfflineWorker;
use crate::cache::{CacheStorage, MemoryCacheStorage, SqliteCacheStorage};
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::network::{Fetcher, HttpFetcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Builder for configuring an [`OfflineWorker`].
///
/// # Example
///
/// ```rust,ignore
/// use gamecache::{OfflineWorker, WorkerConfig};
///
/// let worker = OfflineWorker::builder(WorkerConfig::new(origin))
///     .with_sqlite_path("./data/gamecache.db")
///     .build()?;
/// ```
pub struct OfflineWorkerBuilder {
    config: WorkerConfig,
    storage: Option<Arc<dyn CacheStorage>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    sqlite_path: Option<PathBuf>,
}

impl OfflineWorkerBuilder {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            storage: None,
            fetcher: None,
            sqlite_path: None,
        }
    }

    /// Use a specific storage backend.
    ///
    /// Default: [`MemoryCacheStorage`]
    pub fn with_storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Keep caches in a SQLite database file.
    ///
    /// Ignored when [`with_storage`](Self::with_storage) is also set.
    pub fn with_sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sqlite_path = Some(path.into());
        self
    }

    /// Use a specific fetcher.
    ///
    /// Default: [`HttpFetcher`] with the configured request timeout.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Build the worker.
    pub fn build(self) -> Result<OfflineWorker> {
        self.config.validate()?;

        let storage: Arc<dyn CacheStorage> = match (self.storage, self.sqlite_path) {
            (Some(storage), _) => storage,
            (None, Some(path)) => {
                debug!("Using SQLite cache storage at {}", path.display());
                Arc::new(SqliteCacheStorage::open_path(path)?)
            }
            (None, None) => Arc::new(MemoryCacheStorage::new()),
        };

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::with_timeout(self.config.request_timeout())?),
        };

        OfflineWorker::new(self.config, storage, fetcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StubFetcher;
    use crate::worker::WorkerState;
    use tempfile::TempDir;

    #[test]
    fn test_build_defaults() {
        let worker = OfflineWorkerBuilder::new(WorkerConfig::default())
            .with_fetcher(Arc::new(StubFetcher::new()))
            .build()
            .unwrap();
        assert_eq!(worker.state(), WorkerState::Parsed);
        assert!(worker.is_online());
        assert!(worker.storage().namespaces().unwrap().is_empty());
    }

    #[test]
    fn test_build_with_sqlite_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gamecache.db");

        let worker = OfflineWorkerBuilder::new(WorkerConfig::default())
            .with_sqlite_path(&path)
            .with_fetcher(Arc::new(StubFetcher::new()))
            .build()
            .unwrap();
        worker.storage().open("app-data-v1").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = WorkerConfig::default();
        config.image_precache_concurrency = 0;
        assert!(OfflineWorkerBuilder::new(config).build().is_err());
    }
}
