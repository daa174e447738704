//! gamecache - offline-caching request router for a browser game portal.
//!
//! The crate intercepts requests made by the portal and decides, per request,
//! which named cache namespace to consult and how: cache-only for bundled
//! offline games, cache-first for images and the player library,
//! stale-while-revalidate for API data and cross-origin game resources, and
//! network-only for the resource proxy API.
//!
//! It has no HTTP server of its own; `gamecache-server` hosts it over HTTP,
//! and tests drive it directly with a [`StubFetcher`].
//!
//! # Example
//!
//! ```rust,ignore
//! use gamecache::{FetchRequest, OfflineWorker, WorkerConfig};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> gamecache::Result<()> {
//!     let origin = Url::parse("https://portal.example/").unwrap();
//!     let worker = OfflineWorker::builder(WorkerConfig::new(origin.clone())).build()?;
//!
//!     // Precache, drop superseded namespaces, start intercepting.
//!     worker.start().await?;
//!
//!     let request = FetchRequest::get(origin.join("/api/games").unwrap());
//!     match worker.handle_fetch(&request).await {
//!         Some(response) => println!("served {} bytes", response.body.len()),
//!         None => println!("not handled here"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod routing;
pub mod worker;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStorage, MemoryCacheStorage, NamespaceMeta, SqliteCacheStorage};
pub use config::{CacheNamespaces, MediaImageRule, NamespaceSpec, RouteProfile, WorkerConfig};
pub use error::{GameCacheError, Result};
pub use models::{cache_key, FetchRequest, FetchResponse, SyntheticResponse};
pub use network::{Fetcher, HttpFetcher, StubFetcher};
pub use routing::{Route, RouteRule, RouteTable, Strategy};
pub use worker::{
    ActivationReport, MessageReply, OfflineWorker, OfflineWorkerBuilder, PrecacheReport,
    StartReport, WorkerMessage, WorkerState,
};
