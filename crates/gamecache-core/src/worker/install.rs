//! Install-time precache of core API data and game images.

use super::{OfflineWorker, WorkerState};
use crate::error::Result;
use crate::models::FetchRequest;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Outcome of the install-time precache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrecacheReport {
    pub api_cached: usize,
    pub api_failed: usize,
    pub images_cached: usize,
    pub images_failed: usize,
    /// Number of image batches issued.
    pub image_batches: usize,
}

impl OfflineWorker {
    /// Precache bootstrap API data and the game images it references.
    ///
    /// Individual failures are logged and counted, never returned. Only a
    /// storage failure while opening a namespace aborts the install,
    /// and then the worker returns to the state it was in before.
    pub async fn install(&self) -> Result<PrecacheReport> {
        let previous = self.state();
        self.set_state(WorkerState::Installing);
        info!("Installing - precaching core data and game images...");

        match self.precache().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                info!(
                    "Precaching complete: {} API entries, {} images ({} failed)",
                    report.api_cached, report.images_cached, report.images_failed
                );
                Ok(report)
            }
            Err(e) => {
                warn!("Install failed: {}", e);
                self.set_state(previous);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<PrecacheReport> {
        let app_data = self.config.namespaces.app_data.name();
        self.storage.open(&app_data)?;

        let mut report = PrecacheReport::default();
        let mut manifest: Option<Value> = None;

        for path in &self.config.bootstrap_paths {
            let url = match self.config.resolve(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Precache failed: {}", e);
                    report.api_failed += 1;
                    continue;
                }
            };
            let request = FetchRequest::get(url);

            match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    if self.config.image_manifest_path.as_deref() == Some(path.as_str()) {
                        match serde_json::from_slice::<Value>(&response.body) {
                            Ok(value) => manifest = Some(value),
                            Err(e) => warn!("Games listing at {} is not JSON: {}", path, e),
                        }
                    }
                    match self.storage.put(&app_data, &request.cache_key(), &response) {
                        Ok(()) => {
                            report.api_cached += 1;
                            info!("Precached: {}", path);
                        }
                        Err(e) => {
                            report.api_failed += 1;
                            warn!("Precache failed to store {}: {}", path, e);
                        }
                    }
                }
                Ok(response) => {
                    report.api_failed += 1;
                    warn!("Precache failed (bad response): {} {}", path, response.status);
                }
                Err(e) => {
                    report.api_failed += 1;
                    warn!("Precache failed: {} {}", path, e);
                }
            }
        }

        if let Some(manifest) = manifest {
            let images = extract_image_urls(&manifest, &self.config.image_field);
            self.precache_images(&images, &mut report).await?;
        }

        Ok(report)
    }

    /// Fetch images in batches; a batch starts only after the previous one settles.
    async fn precache_images(&self, images: &[String], report: &mut PrecacheReport) -> Result<()> {
        let namespace = self.config.namespaces.game_images.name();
        self.storage.open(&namespace)?;

        info!("Precaching {} game images...", images.len());
        let batch_size = self.config.image_precache_concurrency.max(1);

        for batch in images.chunks(batch_size) {
            report.image_batches += 1;
            let results = join_all(
                batch
                    .iter()
                    .map(|image| self.precache_image(&namespace, image)),
            )
            .await;

            for cached in results {
                if cached {
                    report.images_cached += 1;
                } else {
                    report.images_failed += 1;
                }
            }
        }

        info!(
            "Game images precached: {} success, {} failed",
            report.images_cached, report.images_failed
        );
        Ok(())
    }

    async fn precache_image(&self, namespace: &str, image: &str) -> bool {
        let url = match self.config.resolve(image) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping image: {}", e);
                return false;
            }
        };
        let request = FetchRequest::get(url);
        let key = request.cache_key();

        if let Ok(Some(_)) = self.storage.match_entry(namespace, &key) {
            return true;
        }

        match self.fetcher.fetch(&request).await {
            Ok(response) if response.is_ok() => self.storage.put(namespace, &key, &response).is_ok(),
            Ok(response) => {
                debug!("Image {} returned {}", key, response.status);
                false
            }
            Err(e) => {
                debug!("Image {} failed: {}", key, e);
                false
            }
        }
    }
}

/// Unique image references from a games listing, in first-seen order.
///
/// Non-array listings, non-string values and empty strings yield nothing.
pub fn extract_image_urls(games: &Value, field: &str) -> Vec<String> {
    let Some(games) = games.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    games
        .iter()
        .filter_map(|game| game.get(field).and_then(Value::as_str))
        .filter(|image| !image.is_empty())
        .filter(|image| seen.insert(image.to_string()))
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_image_urls_dedups_in_order() {
        let games = json!([
            {"slug": "a", "image": "/media/a.webp"},
            {"slug": "b", "image": "/media/b.webp"},
            {"slug": "c", "image": "/media/a.webp"},
            {"slug": "d", "image": ""},
            {"slug": "e", "image": 42},
            {"slug": "f"},
        ]);
        assert_eq!(
            extract_image_urls(&games, "image"),
            vec!["/media/a.webp".to_string(), "/media/b.webp".to_string()]
        );
    }

    #[test]
    fn test_extract_image_urls_requires_array() {
        assert!(extract_image_urls(&json!({"image": "/media/a.webp"}), "image").is_empty());
        assert!(extract_image_urls(&json!(null), "image").is_empty());
    }

    #[test]
    fn test_extract_image_urls_custom_field() {
        let games = json!([{"cover": "x.webp"}, {"image": "y.webp"}]);
        assert_eq!(extract_image_urls(&games, "cover"), vec!["x.webp".to_string()]);
    }
}
