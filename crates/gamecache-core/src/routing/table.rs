//! Ordered route table: URL predicate → caching strategy.

use super::rules::RouteRule;
use crate::config::{RouteProfile, WorkerConfig};
use crate::models::SyntheticResponse;
use url::Url;

/// How a matched request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the cache only; never touch the network.
    CacheOnly,
    /// Serve from the cache, fetch and store on a miss.
    CacheFirst,
    /// Serve from the cache and refresh it in the background; fetch on a miss.
    StaleWhileRevalidate,
    /// Always go to the network.
    NetworkOnly,
}

impl Strategy {
    /// True for strategies that read and write cache entries keyed by GET requests.
    pub fn caches_gets(&self) -> bool {
        matches!(self, Strategy::CacheFirst | Strategy::StaleWhileRevalidate)
    }
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: &'static str,
    pub rule: RouteRule,
    pub strategy: Strategy,
    /// Namespace read and written by the strategy.
    pub namespace: Option<String>,
    /// Further namespaces consulted (read-only) on a miss.
    pub fallback_namespaces: Vec<String>,
    /// Returned when neither cache nor network can answer.
    pub offline: SyntheticResponse,
}

impl Route {
    fn new(
        name: &'static str,
        rule: RouteRule,
        strategy: Strategy,
        namespace: Option<String>,
        offline: SyntheticResponse,
    ) -> Self {
        Self {
            name,
            rule,
            strategy,
            namespace,
            fallback_namespaces: Vec::new(),
            offline,
        }
    }

    fn with_fallbacks(mut self, namespaces: Vec<String>) -> Self {
        self.fallback_namespaces = namespaces;
        self
    }
}

/// First-match-wins route table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: Url,
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(origin: Url, routes: Vec<Route>) -> Self {
        Self { origin, routes }
    }

    /// Build the table for the configured profile.
    pub fn from_config(config: &WorkerConfig) -> Self {
        match config.profile {
            RouteProfile::Portal => Self::portal(config),
            RouteProfile::Legacy => Self::legacy(config),
        }
    }

    /// Full portal routing.
    pub fn portal(config: &WorkerConfig) -> Self {
        let ns = &config.namespaces;
        let mut routes = vec![Route::new(
            "core-api",
            RouteRule::SameOriginPath {
                paths: config.bootstrap_paths.clone(),
            },
            Strategy::StaleWhileRevalidate,
            Some(ns.app_data.name()),
            SyntheticResponse::unavailable_json("Data not available offline"),
        )];

        if let Some(media) = &config.media_images {
            routes.push(
                Route::new(
                    "game-image",
                    RouteRule::SameOriginMedia {
                        prefix: media.prefix.clone(),
                        extension: media.extension.clone(),
                    },
                    Strategy::CacheFirst,
                    Some(ns.game_images.name()),
                    SyntheticResponse::new(503, Some("text/plain"), "Image not available offline"),
                )
                .with_fallbacks(media.fallback_namespaces.clone()),
            );
        }

        routes.push(Route::new(
            "virtual-path",
            RouteRule::PathPrefix {
                prefix: config.virtual_prefix.clone(),
            },
            Strategy::CacheOnly,
            Some(ns.game_resources.name()),
            SyntheticResponse::new(
                404,
                Some("text/plain; charset=utf-8"),
                "Resource not found in offline cache. Please re-download the game.",
            ),
        ));
        routes.push(Self::player_route(config));
        routes.push(Route::new(
            "game-resource",
            RouteRule::CrossOrigin {
                excluded_hosts: config.font_hosts.clone(),
            },
            Strategy::StaleWhileRevalidate,
            Some(ns.game_resources.name()),
            SyntheticResponse::unavailable("Offline - Resource not cached"),
        ));
        routes.push(Route::new(
            "resource-api",
            RouteRule::PathPrefix {
                prefix: config.resource_api_prefix.clone(),
            },
            Strategy::NetworkOnly,
            None,
            SyntheticResponse::unavailable("Resource API not available"),
        ));

        Self::new(config.origin.clone(), routes)
    }

    /// Game-host allow-list plus the player library.
    pub fn legacy(config: &WorkerConfig) -> Self {
        let routes = vec![
            Route::new(
                "game-host",
                RouteRule::HostContains {
                    patterns: config.game_host_patterns.clone(),
                },
                Strategy::CacheFirst,
                Some(config.namespaces.game_resources.name()),
                SyntheticResponse::unavailable("Offline - Resource not cached"),
            ),
            Self::player_route(config),
        ];
        Self::new(config.origin.clone(), routes)
    }

    fn player_route(config: &WorkerConfig) -> Route {
        Route::new(
            "player",
            RouteRule::UrlContains {
                patterns: config.player_url_patterns.clone(),
            },
            Strategy::CacheFirst,
            Some(config.namespaces.player.name()),
            SyntheticResponse::unavailable("Ruffle resource not available"),
        )
    }

    /// First route whose rule matches `url`, if any.
    pub fn classify(&self, url: &Url) -> Option<&Route> {
        self.routes.iter().find(|route| route.rule.matches(url, &self.origin))
    }
}
