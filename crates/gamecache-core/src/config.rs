//! Centralized configuration for gamecache.
//!
//! Constants live on unit structs the way the rest of the crate expects;
//! everything a deployment may want to change lives on [`WorkerConfig`],
//! which is handed to the worker at construction and never mutated after.

use crate::error::{GameCacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = "gamecache/0.1";
}

/// Install-time precache defaults.
pub struct PrecacheConfig;

impl PrecacheConfig {
    pub const IMAGE_CONCURRENCY: usize = 5;
    pub const IMAGE_FIELD: &'static str = "image";
    pub const CATEGORIES_PATH: &'static str = "/api/categories";
    pub const GAMES_PATH: &'static str = "/api/games";
}

/// Path conventions shared with the portal front end.
pub struct PathsConfig;

impl PathsConfig {
    pub const MEDIA_PREFIX: &'static str = "/media/";
    pub const MEDIA_EXTENSION: &'static str = ".webp";
    pub const VIRTUAL_PREFIX: &'static str = "/__cached__/";
    pub const RESOURCE_API_PREFIX: &'static str = "/api/game-resource/";
    /// Image cache maintained by the bundler's own worker.
    pub const BUNDLER_IMAGE_CACHE: &'static str = "game-images-cache";
}

/// A versioned cache namespace, named `{family}-{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpec {
    pub family: String,
    pub version: String,
}

impl NamespaceSpec {
    pub fn new(family: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            version: version.into(),
        }
    }

    /// Full namespace name.
    pub fn name(&self) -> String {
        format!("{}-{}", self.family, self.version)
    }

    /// True when `name` belongs to this family but is not the current version.
    pub fn is_superseded(&self, name: &str) -> bool {
        let prefix = format!("{}-", self.family);
        name.starts_with(&prefix) && name != self.name()
    }
}

/// The namespaces the worker owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheNamespaces {
    /// Core API data (categories, games).
    pub app_data: NamespaceSpec,
    /// Game cover images.
    pub game_images: NamespaceSpec,
    /// Game resources, injected resources and virtual paths.
    pub game_resources: NamespaceSpec,
    /// Third-party player library.
    pub player: NamespaceSpec,
}

impl CacheNamespaces {
    pub fn all(&self) -> [&NamespaceSpec; 4] {
        [
            &self.app_data,
            &self.game_images,
            &self.game_resources,
            &self.player,
        ]
    }
}

impl Default for CacheNamespaces {
    fn default() -> Self {
        Self {
            app_data: NamespaceSpec::new("app-data", "v1"),
            game_images: NamespaceSpec::new("game-images", "v1"),
            game_resources: NamespaceSpec::new("game-resources", "v2"),
            player: NamespaceSpec::new("ruffle-player", "v1"),
        }
    }
}

/// Which route table the worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteProfile {
    /// Full portal routing: core API, images, virtual paths, player,
    /// cross-origin game resources and the resource API.
    #[default]
    Portal,
    /// Older routing: a game-host allow-list and the player library, both
    /// cache-first.
    Legacy,
}

/// Same-origin image rule (`/media/*.webp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaImageRule {
    pub prefix: String,
    pub extension: String,
    /// Extra namespaces consulted on a miss before going to the network.
    pub fallback_namespaces: Vec<String>,
}

impl Default for MediaImageRule {
    fn default() -> Self {
        Self {
            prefix: PathsConfig::MEDIA_PREFIX.to_string(),
            extension: PathsConfig::MEDIA_EXTENSION.to_string(),
            fallback_namespaces: vec![PathsConfig::BUNDLER_IMAGE_CACHE.to_string()],
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the portal is served from; decides same-origin vs cross-origin.
    pub origin: Url,
    pub namespaces: CacheNamespaces,
    pub profile: RouteProfile,
    /// API paths precached on install and served stale-while-revalidate.
    pub bootstrap_paths: Vec<String>,
    /// Bootstrap path whose JSON array lists game images.
    pub image_manifest_path: Option<String>,
    /// Field of each game object holding its image reference.
    pub image_field: String,
    /// Images fetched per precache batch.
    pub image_precache_concurrency: usize,
    /// `None` disables the same-origin image rule.
    pub media_images: Option<MediaImageRule>,
    pub virtual_prefix: String,
    /// Substrings of the full URL identifying the player library.
    pub player_url_patterns: Vec<String>,
    /// Cross-origin hosts left to the browser (web fonts).
    pub font_hosts: Vec<String>,
    pub resource_api_prefix: String,
    /// Hostname substrings cached by the legacy profile.
    pub game_host_patterns: Vec<String>,
    /// Activate right after install.
    pub skip_waiting: bool,
    /// Timeout applied by the HTTP fetcher, in seconds. `None` waits forever.
    pub request_timeout_secs: Option<u64>,
}

impl WorkerConfig {
    /// Default configuration for a portal served from `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| GameCacheError::io_with_path(e, path))?;
        let config: WorkerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the worker misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.image_precache_concurrency == 0 {
            return Err(GameCacheError::Config {
                message: "image_precache_concurrency must be at least 1".to_string(),
            });
        }
        if !matches!(self.origin.scheme(), "http" | "https") {
            return Err(GameCacheError::Config {
                message: format!("origin must be http or https, got {}", self.origin),
            });
        }
        for path in self.bootstrap_paths.iter().chain(self.image_manifest_path.iter()) {
            if !path.starts_with('/') {
                return Err(GameCacheError::Config {
                    message: format!("bootstrap path must start with '/': {}", path),
                });
            }
        }
        Ok(())
    }

    /// Resolve a path or URL reference against the origin.
    pub fn resolve(&self, reference: &str) -> Result<Url> {
        self.origin
            .join(reference)
            .map_err(|e| GameCacheError::invalid_url(reference, e))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:3000/").expect("static origin parses"),
            namespaces: CacheNamespaces::default(),
            profile: RouteProfile::default(),
            bootstrap_paths: vec![
                PrecacheConfig::CATEGORIES_PATH.to_string(),
                PrecacheConfig::GAMES_PATH.to_string(),
            ],
            image_manifest_path: Some(PrecacheConfig::GAMES_PATH.to_string()),
            image_field: PrecacheConfig::IMAGE_FIELD.to_string(),
            image_precache_concurrency: PrecacheConfig::IMAGE_CONCURRENCY,
            media_images: Some(MediaImageRule::default()),
            virtual_prefix: PathsConfig::VIRTUAL_PREFIX.to_string(),
            player_url_patterns: vec!["ruffle".to_string(), "@ruffle-rs".to_string()],
            font_hosts: vec![
                "fonts.googleapis.com".to_string(),
                "fonts.gstatic.com".to_string(),
            ],
            resource_api_prefix: PathsConfig::RESOURCE_API_PREFIX.to_string(),
            game_host_patterns: vec![
                "html5games.com".to_string(),
                "iogames.space".to_string(),
                "gameforge.com".to_string(),
                "github.io".to_string(),
                "vseigru.net".to_string(),
            ],
            skip_waiting: true,
            request_timeout_secs: Some(NetworkConfig::REQUEST_TIMEOUT.as_secs()),
        }
    }
}
