//! The offline worker: lifecycle, request interception and message handling.

mod activate;
mod builder;
mod install;
mod messages;

pub use activate::ActivationReport;
pub use builder::OfflineWorkerBuilder;
pub use install::{extract_image_urls, PrecacheReport};
pub use messages::{GameReply, MessageReply, ResourceReply, ResponseData, WorkerMessage};

use crate::cache::{CacheStats, CacheStorage};
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::models::{FetchRequest, FetchResponse};
use crate::network::Fetcher;
use crate::routing::{self, Revalidation, RouteTable, StrategyContext};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Lifecycle position of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Result of [`OfflineWorker::start`].
#[derive(Debug, Clone, Serialize)]
pub struct StartReport {
    pub precache: PrecacheReport,
    /// `None` when activation waits for an explicit [`OfflineWorker::activate`].
    pub activation: Option<ActivationReport>,
}

/// Offline-caching intermediary for the game portal.
///
/// The worker owns its route table, its cache storage and its fetcher. It is
/// driven through explicit calls rather than events:
///
/// ```rust,ignore
/// use gamecache::{FetchRequest, OfflineWorker, WorkerConfig};
///
/// let worker = OfflineWorker::builder(WorkerConfig::new(origin)).build()?;
/// worker.start().await?;
///
/// if let Some(response) = worker.handle_fetch(&FetchRequest::get(url)).await {
///     // served by the worker
/// }
/// ```
pub struct OfflineWorker {
    config: Arc<WorkerConfig>,
    routes: RouteTable,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    state: RwLock<WorkerState>,
    online: AtomicBool,
    revalidations: Mutex<JoinSet<()>>,
}

impl OfflineWorker {
    /// Create a worker from its parts.
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let routes = RouteTable::from_config(&config);

        Ok(Self {
            config: Arc::new(config),
            routes,
            storage,
            fetcher,
            state: RwLock::new(WorkerState::Parsed),
            online: AtomicBool::new(true),
            revalidations: Mutex::new(JoinSet::new()),
        })
    }

    /// Create a builder for an `OfflineWorker`.
    pub fn builder(config: WorkerConfig) -> OfflineWorkerBuilder {
        OfflineWorkerBuilder::new(config)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Mark the network as reachable or not.
    ///
    /// While offline, cached responses are served without a background refresh.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!("Network marked {}", if online { "online" } else { "offline" });
        }
    }

    /// Install, then activate immediately when `skip_waiting` is set.
    pub async fn start(&self) -> Result<StartReport> {
        let precache = self.install().await?;
        let activation = if self.config.skip_waiting {
            Some(self.activate().await?)
        } else {
            None
        };
        Ok(StartReport {
            precache,
            activation,
        })
    }

    /// Intercept a request.
    ///
    /// Returns `None` when the worker is not active or no route claims the
    /// request; the caller then handles it the default way.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Option<FetchResponse> {
        if self.state() != WorkerState::Activated {
            debug!("Worker not active, passing through {}", request.url);
            return None;
        }

        let route = self.routes.classify(&request.url)?;
        debug!("{} {} -> {}", request.method, request.url, route.name);

        let ctx = StrategyContext {
            storage: self.storage.clone(),
            fetcher: self.fetcher.clone(),
            online: self.is_online(),
        };
        let outcome = routing::execute(&ctx, route, request).await;

        if let Some(revalidation) = outcome.revalidation {
            self.spawn_revalidation(revalidation).await;
        }

        Some(outcome.response)
    }

    async fn spawn_revalidation(&self, revalidation: Revalidation) {
        let mut tasks = self.revalidations.lock().await;
        // Reap finished refreshes so the set stays small.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(revalidation);
    }

    /// Wait for every background refresh started so far.
    ///
    /// The pending set is taken out of the lock first, so requests served
    /// meanwhile can still schedule refreshes.
    pub async fn settle(&self) {
        let mut tasks = std::mem::take(&mut *self.revalidations.lock().await);
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Background refresh task failed: {}", e);
            }
        }
    }

    /// Statistics for every namespace in storage.
    pub fn stats(&self) -> Result<CacheStats> {
        self.storage.stats()
    }
}
