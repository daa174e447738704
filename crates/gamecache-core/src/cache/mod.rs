//! Named cache namespaces.
//!
//! Every namespace is an isolated key-value bucket of captured responses.
//! Two backends share one trait:
//! - [`MemoryCacheStorage`]: plain in-process maps
//! - [`SqliteCacheStorage`]: a single SQLite database, in memory or on disk

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryCacheStorage;
pub use sqlite::SqliteCacheStorage;
pub use traits::{CacheStats, CacheStorage, NamespaceMeta};
