//! Caching strategy execution.
//!
//! Every path here ends in a response. Storage errors are logged and read as
//! misses, network failures become the route's synthetic response, and the
//! background half of stale-while-revalidate is handed back to the caller as
//! a future so the caller decides where it runs.

use super::table::{Route, Strategy};
use crate::cache::CacheStorage;
use crate::models::{cache_key, FetchRequest, FetchResponse, SyntheticResponse};
use crate::network::Fetcher;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Background cache refresh produced by stale-while-revalidate.
pub type Revalidation = BoxFuture<'static, ()>;

/// Result of running a strategy.
pub struct Outcome {
    pub response: FetchResponse,
    pub revalidation: Option<Revalidation>,
}

impl Outcome {
    fn immediate(response: FetchResponse) -> Self {
        Self {
            response,
            revalidation: None,
        }
    }
}

/// What a strategy needs to run.
#[derive(Clone)]
pub struct StrategyContext {
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    /// When false, stale-while-revalidate skips its background refresh.
    pub online: bool,
}

/// Run the route's strategy for `request`.
pub async fn execute(ctx: &StrategyContext, route: &Route, request: &FetchRequest) -> Outcome {
    // Cache entries are keyed by GET requests only.
    if route.strategy.caches_gets() && !request.is_get() {
        debug!(
            "[{}] {} {} bypasses the cache",
            route.name, request.method, request.url
        );
        let failed = SyntheticResponse::request_failed();
        return Outcome::immediate(network_only(ctx, route.name, request, &failed).await);
    }

    let namespace = route.namespace.as_deref();
    match (route.strategy, namespace) {
        (Strategy::StaleWhileRevalidate, Some(namespace)) => {
            stale_while_revalidate(ctx, route, namespace, request).await
        }
        (Strategy::CacheFirst, Some(namespace)) => {
            Outcome::immediate(cache_first(ctx, route, namespace, request).await)
        }
        (Strategy::CacheOnly, Some(namespace)) => {
            Outcome::immediate(cache_only(ctx, route, namespace, request))
        }
        (Strategy::NetworkOnly, _) | (_, None) => {
            Outcome::immediate(network_only(ctx, route.name, request, &route.offline).await)
        }
    }
}

async fn stale_while_revalidate(
    ctx: &StrategyContext,
    route: &Route,
    namespace: &str,
    request: &FetchRequest,
) -> Outcome {
    let key = request.cache_key();

    if let Some(cached) = lookup(ctx.storage.as_ref(), namespace, &key) {
        debug!("[{}] Serving from cache: {}", route.name, key);
        let revalidation = ctx.online.then(|| {
            revalidate(
                ctx.storage.clone(),
                ctx.fetcher.clone(),
                namespace.to_string(),
                request.clone(),
            )
        });
        return Outcome {
            response: cached,
            revalidation,
        };
    }

    debug!("[{}] No cache, fetching from network: {}", route.name, key);
    let response = match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                store(ctx.storage.as_ref(), namespace, &key, &response);
            }
            response
        }
        Err(e) => {
            warn!("[{}] Network fetch failed for {}: {}", route.name, key, e);
            route.offline.to_response()
        }
    };
    Outcome::immediate(response)
}

fn revalidate(
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    namespace: String,
    request: FetchRequest,
) -> Revalidation {
    async move {
        let key = request.cache_key();
        match fetcher.fetch(&request).await {
            Ok(response) if response.is_ok() => {
                store(storage.as_ref(), &namespace, &key, &response);
                debug!("Updated cache for: {}", key);
            }
            Ok(response) => {
                debug!("Revalidation of {} returned {}, keeping cached copy", key, response.status);
            }
            Err(e) => {
                debug!("Revalidation of {} failed: {}", key, e);
            }
        }
    }
    .boxed()
}

async fn cache_first(
    ctx: &StrategyContext,
    route: &Route,
    namespace: &str,
    request: &FetchRequest,
) -> FetchResponse {
    let key = request.cache_key();

    let cached = std::iter::once(namespace)
        .chain(route.fallback_namespaces.iter().map(String::as_str))
        .find_map(|ns| lookup(ctx.storage.as_ref(), ns, &key));
    if let Some(cached) = cached {
        debug!("[{}] Cache hit: {}", route.name, key);
        return cached;
    }

    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                store(ctx.storage.as_ref(), namespace, &key, &response);
                debug!("[{}] Fetched and cached: {}", route.name, key);
            }
            response
        }
        Err(e) => {
            warn!("[{}] Fetch failed for {}: {}", route.name, key, e);
            route.offline.to_response()
        }
    }
}

fn cache_only(
    ctx: &StrategyContext,
    route: &Route,
    namespace: &str,
    request: &FetchRequest,
) -> FetchResponse {
    // Entries are stored for GET; other methods never match.
    let hit = if request.is_get() {
        virtual_key_variants(&request.url)
            .into_iter()
            .find_map(|key| lookup(ctx.storage.as_ref(), namespace, &key))
    } else {
        None
    };

    match hit {
        Some(response) => {
            debug!("[{}] Cached resource hit: {}", route.name, request.url);
            response
        }
        None => {
            warn!("[{}] Cached resource miss: {}", route.name, request.url);
            route.offline.to_response()
        }
    }
}

async fn network_only(
    ctx: &StrategyContext,
    name: &str,
    request: &FetchRequest,
    offline: &SyntheticResponse,
) -> FetchResponse {
    match ctx.fetcher.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!("[{}] {} {} failed: {}", name, request.method, request.url, e);
            offline.to_response()
        }
    }
}

/// Keys tried, in order, for a cache-only lookup.
///
/// Directory entries may be stored as `.../dir/` and requested as
/// `.../dir/index.html`, or the other way round.
pub fn virtual_key_variants(url: &Url) -> Vec<String> {
    let mut variants = vec![cache_key(url)];

    let path = url.path();
    let alternate = match path.strip_suffix("index.html") {
        Some(dir) if dir.ends_with('/') => Some(dir.to_string()),
        _ if path.ends_with('/') => Some(format!("{}index.html", path)),
        _ => None,
    };

    if let Some(alternate) = alternate {
        let mut url = url.clone();
        url.set_path(&alternate);
        variants.push(cache_key(&url));
    }

    variants
}

fn lookup(storage: &dyn CacheStorage, namespace: &str, key: &str) -> Option<FetchResponse> {
    match storage.match_entry(namespace, key) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Cache read failed in {} for {}: {}", namespace, key, e);
            None
        }
    }
}

fn store(storage: &dyn CacheStorage, namespace: &str, key: &str, response: &FetchResponse) {
    if let Err(e) = storage.put(namespace, key, response) {
        warn!("Cache write failed in {} for {}: {}", namespace, key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStorage;
    use crate::config::WorkerConfig;
    use crate::network::StubFetcher;
    use crate::routing::RouteTable;
    use reqwest::Method;

    struct Harness {
        storage: Arc<MemoryCacheStorage>,
        fetcher: Arc<StubFetcher>,
        table: RouteTable,
    }

    impl Harness {
        fn new() -> Self {
            let config = WorkerConfig::new(Url::parse("https://portal.test/").unwrap());
            Self {
                storage: Arc::new(MemoryCacheStorage::new()),
                fetcher: Arc::new(StubFetcher::new()),
                table: RouteTable::portal(&config),
            }
        }

        fn ctx(&self, online: bool) -> StrategyContext {
            StrategyContext {
                storage: self.storage.clone(),
                fetcher: self.fetcher.clone(),
                online,
            }
        }

        async fn run(&self, request: &FetchRequest, online: bool) -> Outcome {
            let route = self.table.classify(&request.url).expect("route");
            execute(&self.ctx(online), route, request).await
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_virtual_key_variants() {
        assert_eq!(
            virtual_key_variants(&url("https://portal.test/__cached__/x/page/index.html")),
            vec![
                "https://portal.test/__cached__/x/page/index.html".to_string(),
                "https://portal.test/__cached__/x/page/".to_string(),
            ]
        );
        assert_eq!(
            virtual_key_variants(&url("https://portal.test/__cached__/x/page/")),
            vec![
                "https://portal.test/__cached__/x/page/".to_string(),
                "https://portal.test/__cached__/x/page/index.html".to_string(),
            ]
        );
        assert_eq!(
            virtual_key_variants(&url("https://portal.test/__cached__/x/main.js")).len(),
            1
        );
        // "notindex.html" is a file, not a directory index.
        assert_eq!(
            virtual_key_variants(&url("https://portal.test/__cached__/x/notindex.html")).len(),
            1
        );
    }

    #[tokio::test]
    async fn test_cache_first_fetches_and_stores_on_miss() {
        let h = Harness::new();
        let image = url("https://portal.test/media/a.webp");
        h.fetcher.respond_ok(&image, "webp");

        let first = h.run(&FetchRequest::get(image.clone()), true).await;
        assert_eq!(&first.response.body[..], b"webp");
        assert!(first.revalidation.is_none());

        h.fetcher.set_offline(true);
        let second = h.run(&FetchRequest::get(image.clone()), true).await;
        assert_eq!(&second.response.body[..], b"webp");
        assert_eq!(h.fetcher.call_count(&image), 1);
    }

    #[tokio::test]
    async fn test_cache_first_consults_fallback_namespace() {
        let h = Harness::new();
        let image = url("https://portal.test/media/b.webp");
        h.storage
            .put("game-images-cache", image.as_str(), &FetchResponse::new(200, "bundled"))
            .unwrap();

        let outcome = h.run(&FetchRequest::get(image.clone()), true).await;
        assert_eq!(&outcome.response.body[..], b"bundled");
        assert_eq!(h.fetcher.call_count(&image), 0);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let h = Harness::new();
        let image = url("https://portal.test/media/missing.webp");

        let outcome = h.run(&FetchRequest::get(image.clone()), true).await;
        assert_eq!(outcome.response.status, 404);
        assert!(h.storage.match_entry("game-images-v1", image.as_str()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_first_total_failure_is_503() {
        let h = Harness::new();
        h.fetcher.set_offline(true);

        let outcome = h
            .run(&FetchRequest::get(url("https://portal.test/media/c.webp")), true)
            .await;
        assert_eq!(outcome.response.status, 503);
        assert_eq!(&outcome.response.body[..], b"Image not available offline");
        assert_eq!(outcome.response.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_swr_skips_refresh_when_offline() {
        let h = Harness::new();
        let games = url("https://portal.test/api/games");
        h.storage
            .put("app-data-v1", games.as_str(), &FetchResponse::new(200, "[]"))
            .unwrap();

        let outcome = h.run(&FetchRequest::get(games.clone()), false).await;
        assert_eq!(&outcome.response.body[..], b"[]");
        assert!(outcome.revalidation.is_none());
    }

    #[tokio::test]
    async fn test_swr_refresh_keeps_cache_on_error_status() {
        let h = Harness::new();
        let games = url("https://portal.test/api/games");
        h.storage
            .put("app-data-v1", games.as_str(), &FetchResponse::new(200, "old"))
            .unwrap();
        h.fetcher.respond(&games, FetchResponse::new(500, "boom"));

        let outcome = h.run(&FetchRequest::get(games.clone()), true).await;
        outcome.revalidation.expect("refresh scheduled").await;

        let cached = h.storage.match_entry("app-data-v1", games.as_str()).unwrap().unwrap();
        assert_eq!(&cached.body[..], b"old");
    }

    #[tokio::test]
    async fn test_swr_miss_returns_non_ok_network_response_uncached() {
        let h = Harness::new();
        let asset = url("https://cdn.test/gone.js");
        h.fetcher.respond(&asset, FetchResponse::new(410, "gone"));

        let outcome = h.run(&FetchRequest::get(asset.clone()), true).await;
        assert_eq!(outcome.response.status, 410);
        assert!(h.storage.keys("game-resources-v2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache_and_fails_with_503() {
        let h = Harness::new();
        let asset = url("https://cdn.test/game.js");
        h.storage
            .put("game-resources-v2", asset.as_str(), &FetchResponse::new(200, "cached"))
            .unwrap();
        h.fetcher.set_offline(true);

        let outcome = h.run(&FetchRequest::new(Method::HEAD, asset), true).await;
        assert_eq!(outcome.response.status, 503);
        assert_eq!(&outcome.response.body[..], b"Request failed");
    }

    #[tokio::test]
    async fn test_network_only_passthrough() {
        let h = Harness::new();
        let api = url("https://portal.test/api/game-resource/snake/main.js");
        h.fetcher.respond_ok(&api, "js");

        let outcome = h.run(&FetchRequest::get(api.clone()), true).await;
        assert_eq!(&outcome.response.body[..], b"js");
        assert!(h.storage.namespaces().unwrap().is_empty());

        h.fetcher.fail(&api);
        let outcome = h.run(&FetchRequest::get(api), true).await;
        assert_eq!(outcome.response.status, 503);
        assert_eq!(&outcome.response.body[..], b"Resource API not available");
    }

    #[tokio::test]
    async fn test_cache_only_never_fetches() {
        let h = Harness::new();
        let page = url("https://portal.test/__cached__/snake/level2.html");

        let outcome = h.run(&FetchRequest::get(page.clone()), true).await;
        assert_eq!(outcome.response.status, 404);
        assert_eq!(
            outcome.response.content_type(),
            Some("text/plain; charset=utf-8")
        );
        assert!(h.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_only_matches_get_only() {
        let h = Harness::new();
        let page = url("https://portal.test/__cached__/snake/");
        h.storage
            .put("game-resources-v2", page.as_str(), &FetchResponse::new(200, "<html>"))
            .unwrap();

        let get = h.run(&FetchRequest::get(page.clone()), true).await;
        assert_eq!(get.response.status, 200);

        for method in [Method::HEAD, Method::POST] {
            let outcome = h.run(&FetchRequest::new(method, page.clone()), true).await;
            assert_eq!(outcome.response.status, 404);
        }
        assert!(h.fetcher.calls().is_empty());
    }
}
