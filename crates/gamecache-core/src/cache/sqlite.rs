//! SQLite-backed cache storage.

use super::traits::{CacheStats, CacheStorage, NamespaceMeta};
use crate::error::{GameCacheError, Result};
use crate::models::FetchResponse;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite cache storage.
///
/// All namespaces share one database. [`SqliteCacheStorage::in_memory`] keeps
/// the database in process memory; [`SqliteCacheStorage::open_path`] writes
/// it to disk so the caches survive a restart the way browser caches do.
pub struct SqliteCacheStorage {
    /// Database connection (wrapped for thread safety).
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCacheStorage {
    /// Create a cache backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| GameCacheError::Storage {
            message: format!("Failed to open in-memory cache database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    /// Create a cache at the specified database path.
    ///
    /// Creates the database and tables if they don't exist.
    pub fn open_path(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GameCacheError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| GameCacheError::Storage {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| GameCacheError::Storage {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        debug!("Opened cache database at {}", db_path.display());
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_namespaces (
                namespace TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                status INTEGER NOT NULL,
                status_text TEXT NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| GameCacheError::Storage {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| GameCacheError::Storage {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn ensure_namespace(conn: &Connection, namespace: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO cache_namespaces (namespace, created_at) VALUES (?1, ?2)",
            params![namespace, Utc::now().to_rfc3339()],
        )
        .map_err(|e| GameCacheError::Storage {
            message: format!("Failed to create namespace {}: {}", namespace, e),
            source: Some(e),
        })?;
        Ok(())
    }
}

impl CacheStorage for SqliteCacheStorage {
    fn open(&self, namespace: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_namespace(&conn, namespace)
    }

    fn match_entry(&self, namespace: &str, key: &str) -> Result<Option<FetchResponse>> {
        let conn = self.lock()?;

        let row: Option<(u16, String, String, Vec<u8>)> = conn
            .query_row(
                r#"
                SELECT status, status_text, headers, body
                FROM cache_entries
                WHERE namespace = ?1 AND key = ?2
                "#,
                params![namespace, key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|e| GameCacheError::Storage {
                message: format!("Failed to query cache entry: {}", e),
                source: Some(e),
            })?;

        let Some((status, status_text, headers_json, body)) = row else {
            return Ok(None);
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;

        Ok(Some(FetchResponse {
            status,
            status_text,
            headers,
            body: body.into(),
        }))
    }

    fn put(&self, namespace: &str, key: &str, response: &FetchResponse) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_namespace(&conn, namespace)?;

        let headers_json = serde_json::to_string(&response.headers)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO cache_entries
            (namespace, key, status, status_text, headers, body, size_bytes, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                namespace,
                key,
                response.status,
                response.status_text,
                headers_json,
                &response.body[..],
                response.size() as i64,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| GameCacheError::Storage {
            message: format!("Failed to set cache entry: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )
            .map_err(|e| GameCacheError::Storage {
                message: format!("Failed to delete cache entry: {}", e),
                source: Some(e),
            })?;

        Ok(deleted > 0)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT key FROM cache_entries WHERE namespace = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![namespace], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn namespaces(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT namespace FROM cache_namespaces ORDER BY namespace")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(names)
    }

    fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let conn = self.lock()?;

        let entries = conn
            .execute(
                "DELETE FROM cache_entries WHERE namespace = ?1",
                params![namespace],
            )
            .map_err(|e| GameCacheError::Storage {
                message: format!("Failed to delete namespace entries: {}", e),
                source: Some(e),
            })?;

        let removed = conn
            .execute(
                "DELETE FROM cache_namespaces WHERE namespace = ?1",
                params![namespace],
            )
            .map_err(|e| GameCacheError::Storage {
                message: format!("Failed to delete namespace: {}", e),
                source: Some(e),
            })?;

        debug!("Deleted namespace {} ({} entries)", namespace, entries);
        Ok(removed > 0)
    }

    fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT n.namespace, COUNT(e.key), COALESCE(SUM(e.size_bytes), 0)
            FROM cache_namespaces n
            LEFT JOIN cache_entries e ON e.namespace = n.namespace
            GROUP BY n.namespace
            "#,
        )?;
        let namespaces = stmt
            .query_map([], |row| {
                Ok(NamespaceMeta {
                    namespace: row.get(0)?,
                    entry_count: row.get::<_, i64>(1)? as usize,
                    total_size_bytes: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CacheStats::from_namespaces(namespaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_and_get_preserves_response() {
        let storage = SqliteCacheStorage::in_memory().unwrap();
        let response = FetchResponse::new(200, &b"\x00binary\xff"[..])
            .with_header("Content-Type", "application/octet-stream");

        storage.put("game-resources-v2", "https://cdn.test/a.bin", &response).unwrap();

        let cached = storage
            .match_entry("game-resources-v2", "https://cdn.test/a.bin")
            .unwrap()
            .unwrap();
        assert_eq!(cached, response);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let storage = SqliteCacheStorage::in_memory().unwrap();
        storage.put("ns", "k", &FetchResponse::new(200, "old")).unwrap();
        storage.put("ns", "k", &FetchResponse::new(200, "new")).unwrap();

        assert_eq!(storage.keys("ns").unwrap().len(), 1);
        let cached = storage.match_entry("ns", "k").unwrap().unwrap();
        assert_eq!(&cached.body[..], b"new");
    }

    #[test]
    fn test_delete_namespace_removes_entries() {
        let storage = SqliteCacheStorage::in_memory().unwrap();
        storage.put("game-resources-v1", "k", &FetchResponse::new(200, "x")).unwrap();
        storage.open("ruffle-player-v1").unwrap();

        assert_eq!(
            storage.namespaces().unwrap(),
            vec!["game-resources-v1", "ruffle-player-v1"]
        );
        assert!(storage.delete_namespace("game-resources-v1").unwrap());
        assert!(storage.match_entry("game-resources-v1", "k").unwrap().is_none());
        assert_eq!(storage.namespaces().unwrap(), vec!["ruffle-player-v1"]);
    }

    #[test]
    fn test_delete_entry() {
        let storage = SqliteCacheStorage::in_memory().unwrap();
        storage.put("ns", "k", &FetchResponse::new(200, "x")).unwrap();

        assert!(storage.delete("ns", "k").unwrap());
        assert!(!storage.delete("ns", "k").unwrap());
    }

    #[test]
    fn test_stats_include_empty_namespaces() {
        let storage = SqliteCacheStorage::in_memory().unwrap();
        storage.open("empty").unwrap();
        storage.put("full", "1", &FetchResponse::new(200, "abcd")).unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.namespace_count, 2);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_size_bytes, 4);
        assert_eq!(stats.namespaces[0].entry_count, 0);
    }

    #[test]
    fn test_file_backed_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache").join("gamecache.db");

        {
            let storage = SqliteCacheStorage::open_path(&db_path).unwrap();
            storage.put("app-data-v1", "k", &FetchResponse::new(200, "[]")).unwrap();
        }

        let storage = SqliteCacheStorage::open_path(&db_path).unwrap();
        assert!(storage.match_entry("app-data-v1", "k").unwrap().is_some());
    }
}
