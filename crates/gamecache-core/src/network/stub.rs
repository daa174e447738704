//! Scripted fetcher for driving a worker without a network.

use super::client::Fetcher;
use crate::error::{GameCacheError, Result};
use crate::models::{cache_key, FetchRequest, FetchResponse};
use async_trait::async_trait;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
enum StubReply {
    Respond(FetchResponse),
    Fail,
}

/// A [`Fetcher`] that answers from a table of canned replies.
///
/// Unknown URLs answer 404. While offline every fetch fails with a network
/// error. Every call is recorded, and the number of fetches in flight at
/// once is tracked so batching can be observed.
#[derive(Default)]
pub struct StubFetcher {
    replies: Mutex<HashMap<String, StubReply>>,
    calls: Mutex<Vec<(Method, String)>>,
    offline: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub fn respond(&self, url: &Url, response: FetchResponse) {
        self.replies
            .lock()
            .expect("stub replies lock")
            .insert(cache_key(url), StubReply::Respond(response));
    }

    /// Answer `url` with a 200 carrying `body`.
    pub fn respond_ok(&self, url: &Url, body: impl Into<bytes::Bytes>) {
        self.respond(url, FetchResponse::new(200, body));
    }

    /// Make fetches of `url` fail as if the host were unreachable.
    pub fn fail(&self, url: &Url) {
        self.replies
            .lock()
            .expect("stub replies lock")
            .insert(cache_key(url), StubReply::Fail);
    }

    /// Fail every fetch while `offline` is true.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().expect("stub calls lock").clone()
    }

    /// Number of calls made for `url`.
    pub fn call_count(&self, url: &Url) -> usize {
        let key = cache_key(url);
        self.calls
            .lock()
            .expect("stub calls lock")
            .iter()
            .filter(|(_, called)| *called == key)
            .count()
    }

    /// Highest number of fetches observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let key = request.cache_key();
        self.calls
            .lock()
            .expect("stub calls lock")
            .push((request.method.clone(), key.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // Let sibling fetches in the same batch start before this one finishes.
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(GameCacheError::Network {
                message: format!("{} {} failed: offline", request.method, key),
                source: None,
            });
        }

        let reply = self
            .replies
            .lock()
            .expect("stub replies lock")
            .get(&key)
            .cloned();
        match reply {
            Some(StubReply::Respond(response)) => Ok(response),
            Some(StubReply::Fail) => Err(GameCacheError::Network {
                message: format!("{} {} failed: unreachable", request.method, key),
                source: None,
            }),
            None => Ok(FetchResponse::new(404, "Not Found")),
        }
    }
}
